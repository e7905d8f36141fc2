//! インストーラー設定
//!
//! 製品名、パッケージ一覧、リポジトリの場所、debconf の事前設定値、
//! ステップが触れるホスト上のパスなど。既定値は組み込みで、
//! `INSTALLER_LOG_DIR` でログディレクトリを上書きできる

use crate::domain::provisioning::DebconfSelection;
use std::path::{Path, PathBuf};

pub const LOG_DIR_ENV: &str = "INSTALLER_LOG_DIR";

/// パッケージの対象となる Debian リリース
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedRelease {
    pub major: u32,
    pub codename: String,
}

#[derive(Debug, Clone)]
pub struct InstallerSettings {
    pub product: String,
    pub log_dir: PathBuf,
    /// ステップが読み書きするホストパスの基点
    pub root: PathBuf,
    pub expected_release: ExpectedRelease,
    pub repository_url: String,
    pub repository_key_url: String,
    pub keyring_path: String,
    pub sources_list_path: String,
    pub script_dependencies: Vec<String>,
    pub packages: Vec<String>,
    pub conflicting_packages: Vec<String>,
    /// インストールで設定が上書きされるサービス
    pub overwritten_services: Vec<String>,
    pub restart_services: Vec<String>,
    pub debconf_seeds: Vec<DebconfSelection>,
    /// インストール後に削除する Raspbian の既定ユーザー
    pub legacy_user: String,
    pub post_install_program: String,
    pub post_install_args: Vec<String>,
    /// post-install 完了時にウィザードが作成するファイル
    pub installed_marker: String,
    pub ssh_keys_marker: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            product: "yunohost".to_string(),
            log_dir: PathBuf::from("/var/log"),
            root: PathBuf::from("/"),
            expected_release: ExpectedRelease {
                major: 12,
                codename: "bookworm".to_string(),
            },
            repository_url: "http://forge.yunohost.org/debian/".to_string(),
            repository_key_url: "https://forge.yunohost.org/yunohost_bookworm.asc".to_string(),
            keyring_path: "/usr/share/keyrings/yunohost-bookworm.asc".to_string(),
            sources_list_path: "/etc/apt/sources.list.d/yunohost.list".to_string(),
            script_dependencies: strings(&[
                "lsb-release",
                "wget",
                "whiptail",
                "gnupg",
                "apt-transport-https",
                "ca-certificates",
                "adduser",
            ]),
            packages: strings(&["yunohost", "yunohost-admin", "postfix"]),
            conflicting_packages: strings(&["apache2", "bind9"]),
            overwritten_services: strings(&[
                "SSH", "SSOwat", "Nginx", "DNSmasq", "OpenLDAP", "NSS", "PAM", "Postfix",
                "Dovecot", "Fail2Ban",
            ]),
            restart_services: strings(&["slapd"]),
            debconf_seeds: default_debconf_seeds(),
            legacy_user: "pi".to_string(),
            post_install_program: "yunohost".to_string(),
            post_install_args: strings(&["tools", "postinstall"]),
            installed_marker: "/etc/yunohost/installed".to_string(),
            ssh_keys_marker: "/etc/yunohost/.ssh_host_keys_regenerated".to_string(),
        }
    }
}

impl InstallerSettings {
    /// 既定値に環境変数の上書きを適用
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
            if !dir.trim().is_empty() {
                settings.log_dir = PathBuf::from(dir);
            }
        }
        settings
    }

    /// すべてのホストパスを `root` 配下に移す
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            log_dir: root.join("var/log"),
            root,
            ..Self::default()
        }
    }

    /// ホストの絶対パスを設定された root から解決する
    pub fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// リポジトリの sources ファイルにそのまま書き込む行
    pub fn sources_line(&self, components: &[&str]) -> String {
        format!(
            "deb [signed-by={}] {} {} {}",
            self.keyring_path,
            self.repository_url,
            self.expected_release.codename,
            components.join(" ")
        )
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_debconf_seeds() -> Vec<DebconfSelection> {
    vec![
        DebconfSelection::new("slapd", "slapd/password1", "password", "yunohost"),
        DebconfSelection::new("slapd", "slapd/password2", "password", "yunohost"),
        DebconfSelection::new("slapd", "slapd/domain", "string", "yunohost.org"),
        DebconfSelection::new("slapd", "shared/organization", "string", "yunohost.org"),
        DebconfSelection::new("slapd", "slapd/allow_ldap_v2", "boolean", "false"),
        DebconfSelection::new("slapd", "slapd/invalid_config", "boolean", "true"),
        DebconfSelection::new("slapd", "slapd/backend", "select", "MDB"),
        DebconfSelection::new("postfix", "postfix/main_mailer_type", "select", "Internet Site"),
        DebconfSelection::new("postfix", "postfix/mailname", "string", "/etc/mailname"),
        DebconfSelection::new("nslcd", "nslcd/ldap-bindpw", "password", ""),
        DebconfSelection::new("nslcd", "nslcd/ldap-starttls", "boolean", "false"),
        DebconfSelection::new("nslcd", "nslcd/ldap-reqcert", "select", ""),
        DebconfSelection::new("nslcd", "nslcd/ldap-uris", "string", "ldap://localhost/"),
        DebconfSelection::new("nslcd", "nslcd/ldap-binddn", "string", ""),
        DebconfSelection::new("nslcd", "nslcd/ldap-base", "string", "dc=yunohost,dc=org"),
        DebconfSelection::new(
            "libnss-ldapd",
            "libnss-ldapd/nsswitch",
            "multiselect",
            "group, passwd, shadow",
        ),
        DebconfSelection::new("postsrsd", "postsrsd/domain", "string", "yunohost.org"),
    ]
}
