//! Tagged risk families: each entry maps a regex to an integer score and a
//! human-readable factor. The scorer takes the max over all matches, so
//! overlapping families compose without ordering concerns.

use regex::Regex;

/// Behavioral family a risk pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskFamily {
    InfoGathering,
    Persistence,
    DataExfil,
    Destructive,
    PrivilegeEscalation,
    Evasion,
    ContainerEscape,
    FileReaders,
    Safe,
}

impl RiskFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFamily::InfoGathering => "info_gathering",
            RiskFamily::Persistence => "persistence",
            RiskFamily::DataExfil => "data_exfil",
            RiskFamily::Destructive => "destructive",
            RiskFamily::PrivilegeEscalation => "privilege_escalation",
            RiskFamily::Evasion => "evasion",
            RiskFamily::ContainerEscape => "container_escape",
            RiskFamily::FileReaders => "file_readers",
            RiskFamily::Safe => "safe",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskPattern {
    pub family: RiskFamily,
    pub regex: Regex,
    /// Score contributed when this pattern matches, in `[1, 10]`.
    pub score: u8,
    /// Human-readable factor appended to the assessment.
    pub factor: String,
}

/// (family, pattern, case-insensitive, score, factor)
type Entry = (RiskFamily, &'static str, bool, u8, &'static str);

#[rustfmt::skip]
const TABLE: &[Entry] = &[
    // ── Destructive ────────────────────────────────────────────────────
    (RiskFamily::Destructive, r"\brm\s+(-[a-zA-Z]+\s+)+/+\*?(\s|$)", false, 10, "Root filesystem deletion"),
    (RiskFamily::Destructive, r"\brm\s+-[a-zA-Z]*([rR][a-zA-Z]*[fF]|[fF][a-zA-Z]*[rR])", false, 8, "Recursive force deletion"),
    (RiskFamily::Destructive, r"\brm\s+-[a-zA-Z]*[rR][a-zA-Z]*\s+~", false, 9, "Home directory deletion"),
    (RiskFamily::Destructive, r"\bmkfs(\.\w+)?\b", false, 10, "Filesystem format"),
    (RiskFamily::Destructive, r"\bdd\s+[^|;]*\bof=/dev/(sd|hd|nvme|vd|disk)", false, 10, "Raw disk write"),
    (RiskFamily::Destructive, r">\s*/dev/(sd|hd|nvme|vd)[a-z]", false, 10, "Raw device overwrite"),
    (RiskFamily::Destructive, r"\bshred\b", false, 9, "Secure file destruction"),
    (RiskFamily::Destructive, r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;?\s*:", false, 10, "Fork bomb"),
    (RiskFamily::Destructive, r"\bchmod\s+-R\s+777\s+/", false, 9, "World-writable root tree"),
    (RiskFamily::Destructive, r"\btruncate\s+-s\s*0\b", false, 7, "File truncation"),
    (RiskFamily::Destructive, r"\bgit\s+push\s+[^|;]*(--force|-f)\b", false, 6, "Force push"),
    (RiskFamily::Destructive, r"\bgit\s+reset\s+--hard\b", false, 5, "Hard reset discards work"),
    (RiskFamily::Destructive, r"\bgit\s+clean\s+-[a-zA-Z]*f", false, 5, "Untracked file removal"),
    (RiskFamily::Destructive, r"\bDROP\s+(TABLE|DATABASE|SCHEMA)\b", true, 9, "SQL drop statement"),
    (RiskFamily::Destructive, r"\bTRUNCATE\s+TABLE\b", true, 8, "SQL table truncation"),
    (RiskFamily::Destructive, r"\bfdisk\b|\bparted\b", false, 8, "Partition table manipulation"),
    (RiskFamily::Destructive, r"\bkillall\b|\bpkill\s+-9\b", false, 6, "Mass process termination"),

    // ── Privilege escalation ───────────────────────────────────────────
    (RiskFamily::PrivilegeEscalation, r"\bsudo\s+(su|-i|-s|bash|sh|zsh)\b", false, 8, "Privilege escalation to root shell"),
    (RiskFamily::PrivilegeEscalation, r"\bsudo\b", false, 6, "Privileged execution"),
    (RiskFamily::PrivilegeEscalation, r"\bdoas\b", false, 6, "Privileged execution"),
    (RiskFamily::PrivilegeEscalation, r"\bsu\s+(-|root)\b", false, 7, "Switch to root user"),
    (RiskFamily::PrivilegeEscalation, r"\bchmod\s+[ug]\+s\b|\bchmod\s+[0-7]?[4-7][0-7]{3}\b", false, 8, "Setuid bit manipulation"),
    (RiskFamily::PrivilegeEscalation, r"\bchown\s+(-[a-zA-Z]+\s+)*root\b", false, 7, "Ownership transfer to root"),
    (RiskFamily::PrivilegeEscalation, r"\bpasswd\s+root\b", false, 8, "Root password change"),
    (RiskFamily::PrivilegeEscalation, r"\buser(add|mod|del)\b|\bgroup(add|mod|del)\b", false, 7, "Account manipulation"),
    (RiskFamily::PrivilegeEscalation, r"\bvisudo\b|/etc/sudoers", false, 8, "Sudoers modification"),
    (RiskFamily::PrivilegeEscalation, r"\bsetcap\b", false, 7, "Capability grant"),

    // ── Persistence ────────────────────────────────────────────────────
    (RiskFamily::Persistence, r"\bcrontab\s+(-|\S+\.txt)|/etc/cron", false, 7, "Cron persistence"),
    (RiskFamily::Persistence, r"\bsystemctl\s+(enable|edit)\b", false, 6, "Service persistence"),
    (RiskFamily::Persistence, r"\blaunchctl\s+(load|bootstrap)\b", false, 7, "LaunchAgent persistence"),
    (RiskFamily::Persistence, r">>?\s*~?/\S*\.(bashrc|zshrc|profile|bash_profile|zprofile)", false, 7, "Shell profile modification"),
    (RiskFamily::Persistence, r"/etc/rc\.local|/etc/init\.d/", false, 7, "Init script persistence"),
    (RiskFamily::Persistence, r"\bat\s+\d{1,2}(:\d{2})?\b", false, 6, "Scheduled one-shot job"),
    (RiskFamily::Persistence, r">>?\s*\S*authorized_keys", false, 8, "SSH key persistence"),
    (RiskFamily::Persistence, r"/etc/ld\.so\.preload|\bLD_PRELOAD=", false, 8, "Library preload hook"),
    (RiskFamily::Persistence, r"\bgit\s+config\s+[^|;]*core\.hooksPath", false, 6, "Git hook redirection"),

    // ── Data exfiltration ──────────────────────────────────────────────
    (RiskFamily::DataExfil, r"\bcurl\s+[^|;]*(-d|--data(-\w+)?|-F|--form|-T|--upload-file)\s", false, 8, "Outbound data upload"),
    (RiskFamily::DataExfil, r"\bwget\s+[^|;]*--post-(data|file)\b", false, 8, "Outbound data upload"),
    (RiskFamily::DataExfil, r"\b(curl|wget)\b[^|;]*\|\s*(ba)?sh\b", false, 9, "Remote script execution"),
    (RiskFamily::DataExfil, r"\bscp\s+[^|;]*\S+@\S+:", false, 7, "File copy to remote host"),
    (RiskFamily::DataExfil, r"\brsync\s+[^|;]*\S+@\S+:", false, 7, "File sync to remote host"),
    (RiskFamily::DataExfil, r"\b(nc|ncat|netcat)\b[^|;]*\s\d{2,5}\b", false, 8, "Raw network connection"),
    (RiskFamily::DataExfil, r"/dev/tcp/", false, 9, "Bash network redirection"),
    (RiskFamily::DataExfil, r"\b(ftp|sftp)\s+\S+", false, 6, "Legacy file transfer"),
    (RiskFamily::DataExfil, r"\bbase64\b[^|;]*\|\s*(curl|wget|nc)\b", false, 9, "Encoded exfiltration"),
    (RiskFamily::DataExfil, r"\btar\s+[a-zA-Z]*c[a-zA-Z]*\s+[^|;]*\|\s*(ssh|nc)\b", false, 8, "Archive streamed off host"),
    (RiskFamily::DataExfil, r"\bcurl\s+[^|;]*(pastebin|transfer\.sh|termbin|ix\.io)", true, 8, "Paste-site upload"),

    // ── Info gathering ─────────────────────────────────────────────────
    (RiskFamily::InfoGathering, r"\bcat\s+/etc/passwd\b", false, 5, "System account enumeration"),
    (RiskFamily::InfoGathering, r"\bcat\s+/etc/shadow\b", false, 9, "Password hash access"),
    (RiskFamily::InfoGathering, r"\buname\s+-a\b", false, 2, "Kernel fingerprinting"),
    (RiskFamily::InfoGathering, r"\b(ifconfig|ip\s+addr|ip\s+route)\b", false, 3, "Network interface enumeration"),
    (RiskFamily::InfoGathering, r"\b(netstat|ss)\s+-[a-zA-Z]+", false, 3, "Socket enumeration"),
    (RiskFamily::InfoGathering, r"\bps\s+(aux|-ef)\b", false, 2, "Process enumeration"),
    (RiskFamily::InfoGathering, r"^\s*(env|printenv)\s*$", false, 4, "Environment variable dump"),
    (RiskFamily::InfoGathering, r"\bnmap\b", false, 7, "Network scanning"),
    (RiskFamily::InfoGathering, r"\barp\s+-a\b", false, 3, "ARP cache enumeration"),
    (RiskFamily::InfoGathering, r"\bfind\s+/\s", false, 4, "Filesystem-wide search"),
    (RiskFamily::InfoGathering, r"\b(last|lastlog|who)\b\s*$", false, 3, "Login history enumeration"),
    (RiskFamily::InfoGathering, r"\bdscl\s+\.\s+(list|read)\b", false, 4, "Directory service enumeration"),

    // ── Evasion ────────────────────────────────────────────────────────
    (RiskFamily::Evasion, r"\bhistory\s+-c\b", false, 7, "History clearing"),
    (RiskFamily::Evasion, r"\bunset\s+HISTFILE\b|\bHISTSIZE=0\b|\bset\s+\+o\s+history\b", false, 7, "History suppression"),
    (RiskFamily::Evasion, r">\s*\S*(bash|zsh)_history", false, 8, "History file truncation"),
    (RiskFamily::Evasion, r"\bbase64\s+(-d|--decode)\b", false, 5, "Base64 decode"),
    (RiskFamily::Evasion, r"\bxxd\s+-r\b", false, 5, "Hex decode"),
    (RiskFamily::Evasion, r"\beval\s+", false, 6, "Dynamic evaluation"),
    (RiskFamily::Evasion, r"\|\s*rev\b", false, 5, "Reversed-string obfuscation"),
    (RiskFamily::Evasion, r"\bprintf\s+[^|;]*\\\\[0-7]{3}", false, 5, "Octal escape construction"),
    (RiskFamily::Evasion, r"\btouch\s+-(t|r)\b", false, 6, "Timestamp manipulation"),
    (RiskFamily::Evasion, r"\bopenssl\s+enc\b", false, 6, "Payload encryption"),
    (RiskFamily::Evasion, r"\bsetsid\b|\bdisown\b", false, 5, "Process detachment"),

    // ── Container escape ───────────────────────────────────────────────
    (RiskFamily::ContainerEscape, r"\bdocker\s+run\s+[^|;]*--privileged\b", false, 9, "Privileged container"),
    (RiskFamily::ContainerEscape, r"\bdocker\s+run\s+[^|;]*-v\s*/:/", false, 9, "Host root mount"),
    (RiskFamily::ContainerEscape, r"docker\.sock", false, 8, "Docker socket access"),
    (RiskFamily::ContainerEscape, r"\bnsenter\b", false, 8, "Namespace entry"),
    (RiskFamily::ContainerEscape, r"\bunshare\b", false, 7, "Namespace manipulation"),
    (RiskFamily::ContainerEscape, r"\bkubectl\s+exec\b", false, 6, "Pod command injection"),
    (RiskFamily::ContainerEscape, r"\bchroot\b", false, 7, "Root directory change"),
    (RiskFamily::ContainerEscape, r"release_agent|/sys/fs/cgroup\S*\s*>", false, 8, "Cgroup escape primitive"),

    // ── File readers (sensitive material) ──────────────────────────────
    (RiskFamily::FileReaders, r"\b(cat|less|more|head|tail|bat|strings|xxd|hexdump)\s+\S*id_(rsa|ed25519|dsa|ecdsa)\b", false, 9, "SSH private key read"),
    (RiskFamily::FileReaders, r"\b(cat|less|more|head|tail|bat)\s+\S*\.(env|pem|key|p12|pfx)\b", false, 8, "Sensitive file read"),
    (RiskFamily::FileReaders, r"\b(cat|less|more|head|tail|bat)\s+\S*\.aws/credentials", false, 9, "Cloud credential read"),
    (RiskFamily::FileReaders, r"\b(cat|less|more|head|tail|bat)\s+\S*\.(netrc|npmrc|pypirc|git-credentials)\b", false, 8, "Stored credential read"),
    (RiskFamily::FileReaders, r"\b(cat|grep)\s+[^|;]*\b(secret|password|token|credential)s?\b", true, 6, "Credential keyword access"),
    (RiskFamily::FileReaders, r"\bwallet\.dat\b|\bkeychain\b", true, 8, "Wallet or keychain access"),
    (RiskFamily::FileReaders, r"\bsecurity\s+(dump-keychain|find-generic-password)\b", false, 9, "Keychain extraction"),

    // ── Safe (read-only day-to-day commands) ───────────────────────────
    (RiskFamily::Safe, r"^\s*(ls|pwd|whoami|date|cal|uptime|hostname)\b", false, 1, "Known safe command"),
    (RiskFamily::Safe, r"^\s*(echo|printf)\s+[^;|&>$\\]*$", false, 1, "Known safe command"),
    (RiskFamily::Safe, r"^\s*(cd|which|type|file|wc|head|tail|sort|uniq)\b", false, 1, "Known safe command"),
    (RiskFamily::Safe, r"^\s*git\s+(status|log|diff|show|branch)\b", false, 1, "Known safe command"),
    (RiskFamily::Safe, r"^\s*(cargo|npm|yarn|pnpm)\s+(check|test|build|fmt)\b", false, 2, "Known build command"),
];

/// Compile the built-in risk table.
pub fn builtin() -> Vec<RiskPattern> {
    TABLE
        .iter()
        .filter_map(|(family, pattern, ci, score, factor)| {
            super::compile(pattern, *ci).map(|regex| RiskPattern {
                family: *family,
                regex,
                score: *score,
                factor: (*factor).to_string(),
            })
        })
        .collect()
}
