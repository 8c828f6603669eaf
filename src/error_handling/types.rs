use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    UnknownDependency(String),
    MissingLicense(String),
    ConfirmationRequired(String),
    InvalidTag(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownDependency(e) => write!(f, "Unknown dependency: {}", e),
            ConfigError::MissingLicense(e) => write!(f, "License required: {}", e),
            ConfigError::ConfirmationRequired(e) => write!(f, "Confirmation required: {}", e),
            ConfigError::InvalidTag(e) => write!(f, "Invalid image tag: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum RuntimeError {
    DaemonUnavailable(String),
    CommandFailed(String),
    CreateFailed(String),
    StartFailed(String),
    StopFailed(String),
    RemoveFailed(String),
    InspectFailed(String),
    PullFailed(String),
    NetworkFailed(String),
    Timeout(String),
    IoError(std::io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DaemonUnavailable(e) => write!(f, "Container runtime unavailable: {}", e),
            RuntimeError::CommandFailed(e) => write!(f, "Runtime command failed: {}", e),
            RuntimeError::CreateFailed(e) => write!(f, "Container creation failed: {}", e),
            RuntimeError::StartFailed(e) => write!(f, "Container start failed: {}", e),
            RuntimeError::StopFailed(e) => write!(f, "Container stop failed: {}", e),
            RuntimeError::RemoveFailed(e) => write!(f, "Container removal failed: {}", e),
            RuntimeError::InspectFailed(e) => write!(f, "Container inspect failed: {}", e),
            RuntimeError::PullFailed(e) => write!(f, "Image pull failed: {}", e),
            RuntimeError::NetworkFailed(e) => write!(f, "Network operation failed: {}", e),
            RuntimeError::Timeout(e) => write!(f, "Runtime operation timed out: {}", e),
            RuntimeError::IoError(e) => write!(f, "Runtime IO error: {}", e),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::IoError(err)
    }
}

#[derive(Debug)]
pub enum SessionError {
    NotFound(PathBuf),
    AlreadyExists(PathBuf),
    IoError(std::io::Error),
    JsonError(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound(p) => write!(f, "Session not found at {}", p.display()),
            SessionError::AlreadyExists(p) => {
                write!(
                    f,
                    "Session already exists at {}, remove it with `mm-tc rm` first",
                    p.display()
                )
            }
            SessionError::IoError(e) => write!(f, "Session IO error: {}", e),
            SessionError::JsonError(e) => write!(f, "Session JSON error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::IoError(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::JsonError(err.to_string())
    }
}

#[derive(Debug)]
pub enum ProbeError {
    Request(String),
    Timeout(String),
    TooManyRedirects(String),
    BadLocation(String),
    UnexpectedStatus(u16),
    BadBody(String),
    MissingVersionHeader,
    StillReachable(u16),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Request(e) => write!(f, "HTTP request failed: {}", e),
            ProbeError::Timeout(e) => write!(f, "HTTP request timed out: {}", e),
            ProbeError::TooManyRedirects(e) => write!(f, "Too many redirects for {}", e),
            ProbeError::BadLocation(e) => write!(f, "Unresolvable Location header: {}", e),
            ProbeError::UnexpectedStatus(s) => write!(f, "Unexpected HTTP status: {}", s),
            ProbeError::BadBody(e) => write!(f, "Unexpected response body: {}", e),
            ProbeError::MissingVersionHeader => write!(f, "Missing version response header"),
            ProbeError::StillReachable(s) => {
                write!(f, "Endpoint unexpectedly reachable (status {})", s)
            }
        }
    }
}

impl std::error::Error for ProbeError {}

#[derive(Debug)]
pub enum OrchestratorError {
    ConfigurationError(ConfigError),
    RuntimeError(RuntimeError),
    SessionError(SessionError),
    ProbeError(ProbeError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            OrchestratorError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
            OrchestratorError::SessionError(e) => write!(f, "Session error: {}", e),
            OrchestratorError::ProbeError(e) => write!(f, "Probe error: {}", e),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<ConfigError> for OrchestratorError {
    fn from(err: ConfigError) -> Self {
        OrchestratorError::ConfigurationError(err)
    }
}

impl From<RuntimeError> for OrchestratorError {
    fn from(err: RuntimeError) -> Self {
        OrchestratorError::RuntimeError(err)
    }
}

impl From<SessionError> for OrchestratorError {
    fn from(err: SessionError) -> Self {
        OrchestratorError::SessionError(err)
    }
}

impl From<ProbeError> for OrchestratorError {
    fn from(err: ProbeError) -> Self {
        OrchestratorError::ProbeError(err)
    }
}
