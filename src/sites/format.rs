//! Variable substitution for site descriptors.
//!
//! Templates contain tokens of the form `${name}` or
//! `${name:formatter(args):formatter2}`. Each token whose variable exists in
//! the dictionary is replaced by the variable's value run through the
//! formatter chain, left to right. Tokens naming unknown variables are left
//! untouched.
//!
//! # Formatters
//! - `upper` - uppercase
//! - `title` - uppercase the first letter of every word
//! - `leftpad(n)` / `rightpad(n)` - pad with spaces to width `n`

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::sites::error::FormatError;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z0-9_:(), ]+)\}").expect("token pattern is valid")
});

/// A single stage of a formatter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Upper,
    Title,
    LeftPad(usize),
    RightPad(usize),
}

impl Formatter {
    /// Parse a chain element such as `upper` or `leftpad(10)`.
    pub fn parse(spec: &str) -> Result<Self, FormatError> {
        let (name, args) = match spec.find('(') {
            Some(open) => {
                let close = spec[open..]
                    .find(')')
                    .map(|i| open + i)
                    .unwrap_or(spec.len());
                let args: Vec<&str> = spec[open + 1..close].split(',').map(str::trim).collect();
                (&spec[..open], args)
            }
            None => (spec, Vec::new()),
        };

        match name {
            "upper" => Ok(Formatter::Upper),
            "title" => Ok(Formatter::Title),
            "leftpad" => Ok(Formatter::LeftPad(width_arg(name, &args)?)),
            "rightpad" => Ok(Formatter::RightPad(width_arg(name, &args)?)),
            other => Err(FormatError::UnknownFormatter(other.to_string())),
        }
    }

    pub fn apply(&self, value: String) -> String {
        match *self {
            Formatter::Upper => value.to_uppercase(),
            Formatter::Title => title_case(&value),
            Formatter::LeftPad(width) => {
                let missing = width.saturating_sub(value.chars().count());
                format!("{}{}", " ".repeat(missing), value)
            }
            Formatter::RightPad(width) => {
                let missing = width.saturating_sub(value.chars().count());
                format!("{}{}", value, " ".repeat(missing))
            }
        }
    }
}

fn width_arg(formatter: &str, args: &[&str]) -> Result<usize, FormatError> {
    let raw = args
        .first()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| FormatError::MissingArgument(formatter.to_string()))?;

    raw.parse().map_err(|source| FormatError::InvalidArgument {
        formatter: formatter.to_string(),
        argument: raw.to_string(),
        source,
    })
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

/// Resolve every known `${...}` token in `template` against `vars`.
pub fn format_template(template: &str, vars: &HashMap<String, String>) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TOKEN.captures_iter(template) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let mut parts = body.as_str().split(':');
        let name = parts.next().unwrap_or_default();
        let Some(value) = vars.get(name) else {
            continue;
        };

        let mut value = value.clone();
        for spec in parts {
            value = Formatter::parse(spec)?.apply(value);
        }

        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> HashMap<String, String> {
        HashMap::from([
            ("var1".to_string(), "value1".to_string()),
            ("var2".to_string(), "value2".to_string()),
        ])
    }

    #[test]
    fn test_format_cases() {
        let cases = [
            ("no vars here", "no vars here"),
            ("one var: ${var1}", "one var: value1"),
            ("two vars: ${var1} and ${var2}", "two vars: value1 and value2"),
            ("repeated: ${var1}/${var1}", "repeated: value1/value1"),
            ("upper: ${var1:upper}", "upper: VALUE1"),
            ("title: ${var1:title}", "title: Value1"),
            ("leftpad: ${var1:leftpad(10)}", "leftpad:     value1"),
            ("rightpad: ${var1:rightpad(10)}", "rightpad: value1    "),
            ("chain: ${var1:title:rightpad(10)}", "chain: Value1    "),
        ];

        let vars = dictionary();
        for (template, expected) in cases {
            assert_eq!(format_template(template, &vars).unwrap(), expected, "template {template}");
        }
    }

    #[test]
    fn test_unknown_variable_left_untouched() {
        let vars = dictionary();
        assert_eq!(
            format_template("${missing:upper}.example.com", &vars).unwrap(),
            "${missing:upper}.example.com"
        );
    }

    #[test]
    fn test_padding_noop_when_wide_enough() {
        let vars = dictionary();
        assert_eq!(format_template("${var1:leftpad(3)}", &vars).unwrap(), "value1");
        assert_eq!(format_template("${var1:rightpad(6)}", &vars).unwrap(), "value1");
    }

    #[test]
    fn test_chain_applies_left_to_right() {
        let vars = HashMap::from([("x".to_string(), "ab".to_string())]);
        // padding first, then uppercase keeps the padding
        assert_eq!(format_template("[${x:leftpad(4):upper}]", &vars).unwrap(), "[  AB]");
        assert_eq!(format_template("[${x:upper:rightpad(3)}]", &vars).unwrap(), "[AB ]");
    }

    #[test]
    fn test_unknown_formatter_is_error() {
        let vars = dictionary();
        let err = format_template("${var1:lower}", &vars).unwrap_err();
        assert!(matches!(err, FormatError::UnknownFormatter(ref f) if f == "lower"));
    }

    #[test]
    fn test_bad_padding_argument() {
        let vars = dictionary();
        assert!(matches!(
            format_template("${var1:leftpad(ten)}", &vars),
            Err(FormatError::InvalidArgument { .. })
        ));
        assert!(matches!(
            format_template("${var1:rightpad()}", &vars),
            Err(FormatError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case("hello big-world"), "Hello Big-World");
        assert_eq!(title_case("snake_case word"), "Snake_case Word");
    }
}
