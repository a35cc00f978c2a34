use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Locals the Rust backend declares inside generated functions.
    static ref RUST_GENERATED_LOCAL: Regex =
        Regex::new(r"^(bb|buffer|data|(len|items|item|run|v)\d+)$").unwrap();
}

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "self", "Self", "static", "struct", "super", "trait", "true", "try", "type", "typeof", "unsafe",
    "unsized", "use", "virtual", "where", "while", "yield",
];

const CPP_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break", "case",
    "catch", "char", "class", "compl", "concept", "const", "consteval", "constexpr", "constinit",
    "const_cast", "continue", "co_await", "co_return", "co_yield", "decltype", "default", "delete",
    "do", "double", "dynamic_cast", "else", "enum", "explicit", "export", "extern", "false", "float",
    "for", "friend", "goto", "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept",
    "not", "not_eq", "nullptr", "operator", "or", "or_eq", "private", "protected", "public",
    "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this", "thread_local", "throw",
    "true", "try", "typedef", "typeid", "typename", "union", "unsigned", "using", "virtual", "void",
    "volatile", "wchar_t", "while", "xor", "xor_eq",
];

/// Converts a string to PascalCase.
/// - With underscores, each word is capitalized and the rest lowercased.
/// - A fully uppercase word keeps only its first letter uppercase.
/// - Otherwise only the first letter changes.
pub fn to_pascal_case(s: &str) -> String {
    fn capitalize(word: &str, lower_rest: bool) -> String {
        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) if lower_rest => first.to_uppercase().to_string() + &chars.as_str().to_lowercase(),
            Some(first) => first.to_uppercase().to_string() + chars.as_str(),
        }
    }

    if s.contains('_') {
        s.split('_')
            .filter(|word| !word.is_empty())
            .map(|word| capitalize(word, true))
            .collect()
    } else {
        capitalize(s, s == s.to_uppercase())
    }
}

/// Converts a string to snake_case. Acronyms stay together, so "sessionID"
/// becomes "session_id" and "HTTPServer" becomes "http_server".
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                if prev != '_'
                    && (!prev.is_uppercase() || (i + 1 < chars.len() && chars[i + 1].is_lowercase()))
                {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

/// Escapes Rust reserved keywords by suffixing with an underscore.
pub fn escape_rust_keyword(s: &str) -> String {
    if RUST_KEYWORDS.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// Escapes C++ reserved keywords by suffixing with an underscore.
pub fn escape_cpp_keyword(s: &str) -> String {
    if CPP_KEYWORDS.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// Rust identifier for a schema field. Keywords and names the generated code
/// uses for its own locals get an underscore suffix.
pub fn rust_field_name(name: &str) -> String {
    let snake = escape_rust_keyword(&to_snake_case(name));
    if RUST_GENERATED_LOCAL.is_match(&snake) {
        format!("{}_", snake)
    } else {
        snake
    }
}

/// C++ identifier for a schema field.
pub fn cpp_field_name(name: &str) -> String {
    escape_cpp_keyword(&to_snake_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("device_status"), "DeviceStatus");
        assert_eq!(to_pascal_case("SIGNAL"), "Signal");
        assert_eq!(to_pascal_case("fleetReport"), "FleetReport");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn snake_case() {
        assert_eq!(to_snake_case("sessionID"), "session_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("Devices"), "devices");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("Max_Value"), "max_value");
    }

    #[test]
    fn keywords() {
        assert_eq!(escape_rust_keyword("type"), "type_");
        assert_eq!(escape_rust_keyword("kind"), "kind");
        assert_eq!(escape_cpp_keyword("class"), "class_");
        assert_eq!(escape_cpp_keyword("Type"), "Type");
        assert_eq!(rust_field_name("Type"), "type_");
        assert_eq!(rust_field_name("BB"), "bb_");
        assert_eq!(rust_field_name("Len0"), "len0_");
        assert_eq!(rust_field_name("Length"), "length");
        assert_eq!(cpp_field_name("Class"), "class_");
        assert_eq!(cpp_field_name("MaxValue"), "max_value");
    }
}
