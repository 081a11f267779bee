//! Command name to installable package resolution.
//!
//! Names come from Debian-family repositories. Commands missing from the
//! table resolve to themselves, since most packages ship a binary of the
//! same name.

use std::collections::HashMap;
use std::sync::LazyLock;

/// `(command, package)` pairs for commands whose package name differs from
/// the binary, plus common tools listed for completeness.
const PACKAGE_TABLE: &[(&str, &str)] = &[
    // Scanning and reconnaissance
    ("nmap", "nmap"),
    ("masscan", "masscan"),
    ("nikto", "nikto"),
    ("hping3", "hping3"),
    ("arp-scan", "arp-scan"),
    ("netdiscover", "netdiscover"),
    ("whois", "whois"),
    ("traceroute", "traceroute"),
    ("tracepath", "iputils-tracepath"),
    ("mtr", "mtr-tiny"),
    ("dig", "dnsutils"),
    ("nslookup", "dnsutils"),
    ("host", "bind9-host"),
    ("ping", "iputils-ping"),
    ("arping", "iputils-arping"),
    // Packet capture
    ("tcpdump", "tcpdump"),
    ("tshark", "tshark"),
    ("wireshark", "wireshark"),
    ("iftop", "iftop"),
    ("nethogs", "nethogs"),
    // Sockets and interfaces
    ("nc", "netcat-openbsd"),
    ("netcat", "netcat-openbsd"),
    ("ncat", "ncat"),
    ("socat", "socat"),
    ("ss", "iproute2"),
    ("ip", "iproute2"),
    ("tc", "iproute2"),
    ("netstat", "net-tools"),
    ("ifconfig", "net-tools"),
    ("route", "net-tools"),
    ("arp", "net-tools"),
    ("iwconfig", "wireless-tools"),
    ("iw", "iw"),
    ("ethtool", "ethtool"),
    ("iptables", "iptables"),
    ("nft", "nftables"),
    ("ufw", "ufw"),
    // Wireless and password auditing
    ("aircrack-ng", "aircrack-ng"),
    ("airmon-ng", "aircrack-ng"),
    ("airodump-ng", "aircrack-ng"),
    ("aireplay-ng", "aircrack-ng"),
    ("john", "john"),
    ("hydra", "hydra"),
    ("hashcat", "hashcat"),
    ("sqlmap", "sqlmap"),
    ("gobuster", "gobuster"),
    ("dirb", "dirb"),
    // Process and system inspection
    ("lsof", "lsof"),
    ("ps", "procps"),
    ("top", "procps"),
    ("free", "procps"),
    ("pkill", "procps"),
    ("htop", "htop"),
    ("strace", "strace"),
    ("ltrace", "ltrace"),
    ("lsusb", "usbutils"),
    ("lspci", "pciutils"),
    ("dmidecode", "dmidecode"),
    // Transfer and remote access
    ("curl", "curl"),
    ("wget", "wget"),
    ("ssh", "openssh-client"),
    ("scp", "openssh-client"),
    ("sshd", "openssh-server"),
    ("rsync", "rsync"),
    ("ftp", "ftp"),
    ("telnet", "telnet"),
    // Development
    ("git", "git"),
    ("gcc", "gcc"),
    ("g++", "g++"),
    ("cc", "gcc"),
    ("make", "make"),
    ("cmake", "cmake"),
    ("gdb", "gdb"),
    ("python3", "python3"),
    ("python", "python-is-python3"),
    ("pip", "python3-pip"),
    ("pip3", "python3-pip"),
    ("node", "nodejs"),
    ("npm", "npm"),
    ("go", "golang-go"),
    ("rustc", "rustc"),
    ("cargo", "cargo"),
    ("java", "default-jre"),
    ("javac", "default-jdk"),
    // Utilities
    ("jq", "jq"),
    ("unzip", "unzip"),
    ("zip", "zip"),
    ("7z", "p7zip-full"),
    ("xxd", "xxd"),
    ("file", "file"),
    ("tree", "tree"),
    ("vim", "vim"),
    ("nano", "nano"),
    ("tmux", "tmux"),
    ("screen", "screen"),
    ("openssl", "openssl"),
    ("gpg", "gnupg"),
];

static PACKAGES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| PACKAGE_TABLE.iter().copied().collect());

/// Reduce a command string to the bare, lowercased command name.
///
/// Strips a leading `sudo` and keeps only the first whitespace-delimited
/// token.
pub fn normalize_command(command: &str) -> String {
    let mut tokens = command.split_whitespace();
    let first = match tokens.next() {
        Some(token) if token.eq_ignore_ascii_case("sudo") => tokens.next().unwrap_or(""),
        Some(token) => token,
        None => "",
    };
    first.to_lowercase()
}

/// Package that provides `command_name`, falling back to the normalized
/// name itself.
pub fn resolve_package(command_name: &str) -> String {
    let name = normalize_command(command_name);
    match PACKAGES.get(name.as_str()) {
        Some(package) => (*package).to_string(),
        None => name,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
