use crate::error::FfireError;

/// Quotes text the way it appears in diagnostics.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize, column: usize) -> FfireError {
    FfireError::Parse {
        msg: msg.to_owned(),
        line,
        column,
    }
}

pub fn unsupported(msg: &str, line: usize, column: usize) -> FfireError {
    FfireError::UnsupportedConstruct {
        msg: msg.to_owned(),
        line,
        column,
    }
}

/// Appends `.name` to a value path.
pub fn field_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", path, name)
    }
}

/// Appends `[index]` to a value path.
pub fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}
