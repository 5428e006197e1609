// Presenting URLs to the user (verification URI during SSO login)
use crate::env;
use crate::error::{Result, SsoError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

const FIREFOX_CONTAINER_FORMAT: &str = "ext+container:name={name}&url={url}&color={color}&icon={icon}";
const GRANTED_CONTAINER_FORMAT: &str =
    "ext+granted-containers:name={name}&url={url}&color={color}&icon={icon}";
const DEFAULT_PRE_MSG: &str = "Please open the following URL in your browser:\n\n";
const DEFAULT_POST_MSG: &str = "\n\n";

// Values accepted by the Firefox container extensions
const CONTAINER_COLORS: &[&str] = &[
    "blue",
    "turquoise",
    "green",
    "yellow",
    "orange",
    "red",
    "pink",
    "purple",
];
const CONTAINER_ICONS: &[&str] = &[
    "fingerprint",
    "briefcase",
    "dollar",
    "cart",
    "gift",
    "vacation",
    "food",
    "fruit",
    "pet",
    "tree",
    "chill",
    "circle",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UrlAction {
    /// Copy to the clipboard
    Clip,
    /// Print a message and the URL to stderr
    Print,
    /// Print only the URL to stderr
    #[serde(rename = "printurl")]
    PrintUrl,
    /// Open in the default or configured browser
    #[default]
    Open,
    /// Run the configured command
    Exec,
    /// Open in a Firefox container via open-url-in-container
    #[serde(alias = "open-in-container")]
    OpenUrlInContainer,
    /// Open in a Firefox container via granted-containers
    GrantedContainers,
}

impl UrlAction {
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            UrlAction::OpenUrlInContainer | UrlAction::GrantedContainers
        )
    }

    /// SSO authentication always happens in the user's primary browser session
    pub fn for_authentication(self) -> Self {
        if self.is_container() {
            UrlAction::Open
        } else {
            self
        }
    }
}

impl std::str::FromStr for UrlAction {
    type Err = SsoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "clip" => Ok(UrlAction::Clip),
            "print" => Ok(UrlAction::Print),
            "printurl" => Ok(UrlAction::PrintUrl),
            "open" => Ok(UrlAction::Open),
            "exec" => Ok(UrlAction::Exec),
            "open-url-in-container" | "open-in-container" => Ok(UrlAction::OpenUrlInContainer),
            "granted-containers" => Ok(UrlAction::GrantedContainers),
            _ => Err(SsoError::InvalidConfig(format!("invalid url action: {}", s))),
        }
    }
}

/// Firefox container to open a URL in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHint {
    pub name: String,
    pub color: String,
    pub icon: String,
}

impl ContainerHint {
    pub fn new(name: impl Into<String>, color: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            icon: icon.into(),
        }
    }
}

/// Presents a URL to the user
pub trait UrlOpener: Send + Sync {
    fn open(&self, action: UrlAction, url: &str, container: &ContainerHint) -> Result<()>;
}

/// Default presenter backed by the system browser, clipboard tools and stderr
#[derive(Debug, Clone, Default)]
pub struct HandleUrl {
    pub browser: Option<String>,
    pub exec_command: Vec<String>,
}

impl HandleUrl {
    pub fn new(browser: Option<String>, exec_command: Vec<String>) -> Self {
        Self {
            browser,
            exec_command,
        }
    }

    fn open_in_browser(&self, url: &str) -> Result<()> {
        match &self.browser {
            Some(browser) => Command::new(browser)
                .arg(url)
                .spawn()
                .map(|_| ())
                .map_err(|e| SsoError::BrowserLaunchFailed(format!("{}: {}", browser, e))),
            None => webbrowser::open(url)
                .map_err(|e| SsoError::BrowserLaunchFailed(e.to_string())),
        }
    }

    fn exec(&self, url: &str) -> Result<()> {
        let (program, args) = exec_args(&self.exec_command, url)?;
        let status = Command::new(&program)
            .args(&args)
            .status()
            .map_err(|e| SsoError::BrowserLaunchFailed(format!("{}: {}", program, e)))?;

        if !status.success() {
            return Err(SsoError::BrowserLaunchFailed(format!(
                "{} exited with {}",
                program, status
            )));
        }
        Ok(())
    }

    fn copy_to_clipboard(&self, url: &str) -> Result<()> {
        let (program, args) = clipboard_command();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| SsoError::BrowserLaunchFailed(format!("{}: {}", program, e)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(url.as_bytes())?;
        }
        child.wait()?;
        eprintln!("Please open URL copied to clipboard.\n");
        Ok(())
    }
}

impl UrlOpener for HandleUrl {
    fn open(&self, action: UrlAction, url: &str, container: &ContainerHint) -> Result<()> {
        let action = if action == UrlAction::Open && env::is_headless_environment() {
            UrlAction::Print
        } else {
            action
        };
        tracing::debug!("Presenting URL with action {:?}", action);

        match action {
            UrlAction::Print => {
                eprint!("{}{}{}", DEFAULT_PRE_MSG, url, DEFAULT_POST_MSG);
                Ok(())
            }
            UrlAction::PrintUrl => {
                eprintln!("{}", url);
                Ok(())
            }
            UrlAction::Clip => self.copy_to_clipboard(url),
            UrlAction::Open => self.open_in_browser(url),
            UrlAction::Exec => self.exec(url),
            UrlAction::OpenUrlInContainer | UrlAction::GrantedContainers => {
                let container_url = container_url(action, url, container);
                if self.exec_command.is_empty() {
                    self.open_in_browser(&container_url)
                } else {
                    self.exec(&container_url)
                }
            }
        }
    }
}

/// Wrap a URL in a Firefox container extension URL
pub fn container_url(action: UrlAction, url: &str, container: &ContainerHint) -> String {
    let format = match action {
        UrlAction::GrantedContainers => GRANTED_CONTAINER_FORMAT,
        _ => FIREFOX_CONTAINER_FORMAT,
    };
    let color = container_option(&container.name, &container.color, CONTAINER_COLORS, "color");
    let icon = container_option(&container.name, &container.icon, CONTAINER_ICONS, "icon");

    format
        .replace("{name}", &container.name)
        .replace("{url}", &urlencoding::encode(url))
        .replace("{color}", color)
        .replace("{icon}", icon)
}

/// `value` if the extension accepts it, otherwise a stable pick based on the container name
fn container_option<'a>(name: &str, value: &'a str, options: &[&'a str], kind: &str) -> &'a str {
    if let Some(option) = options.iter().find(|option| **option == value) {
        return option;
    }
    if !value.is_empty() {
        tracing::warn!("Invalid Firefox container {}: {}", kind, value);
    }
    select_option(name, options)
}

fn select_option<'a>(seed: &str, options: &[&'a str]) -> &'a str {
    let sum = seed.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    options[sum as usize % options.len()]
}

/// Expand `%s` in the exec command, appending the URL if no placeholder is present
fn exec_args(command: &[String], url: &str) -> Result<(String, Vec<String>)> {
    let (program, rest) = command.split_first().ok_or_else(|| {
        SsoError::InvalidConfig("url_exec_command is required for the exec action".to_string())
    })?;

    let mut args: Vec<String> = rest.iter().map(|arg| arg.replace("%s", url)).collect();
    if !command.iter().any(|arg| arg.contains("%s")) {
        args.push(url.to_string());
    }
    Ok((program.clone(), args))
}

fn clipboard_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("pbcopy", &[])
    } else if cfg!(windows) {
        ("clip", &[])
    } else if std::env::var("WAYLAND_DISPLAY").is_ok() {
        ("wl-copy", &[])
    } else {
        ("xclip", &["-selection", "clipboard"])
    }
}
