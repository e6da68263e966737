use std::fmt;

/// User-facing outcome of an action, shown once and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Info(String),
    Error(String),
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Notice::Success(text.into())
    }

    pub fn info(text: impl Into<String>) -> Self {
        Notice::Info(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice::Error(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Notice::Success(text) | Notice::Info(text) | Notice::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Notice::Success(_) => "ok",
            Notice::Info(_) => "info",
            Notice::Error(_) => "error",
        };
        write!(f, "[{}] {}", level, self.text())
    }
}
