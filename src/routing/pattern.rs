//! Path patterns and upstream path templates.
//!
//! # Responsibilities
//! - Parse route patterns such as `foodservice/{**catchall}`
//! - Match request paths, capturing named values
//! - Render upstream paths from templates such as `api/{**catchall}`
//!
//! # Design Decisions
//! - Literal segments match ASCII case-insensitively
//! - `{name}` captures exactly one non-empty segment
//! - `{**name}` (or `{*name}`) is only valid last and captures the rest, possibly empty
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Error produced when a pattern or template cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("catch-all parameter `{0}` must be the last segment")]
    CatchAllNotLast(String),
    #[error("malformed parameter in segment `{0}`")]
    MalformedParameter(String),
    #[error("parameter `{0}` appears more than once")]
    DuplicateParameter(String),
    #[error("template references unknown parameter `{0}`")]
    UnknownParameter(String),
}

/// Values captured while matching a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues(HashMap<String, String>);

impl RouteValues {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    catch_all: Option<String>,
}

/// Parses `{name}`, `{*name}` or `{**name}`. Returns (name, is_catch_all).
fn parse_param(segment: &str) -> Result<Option<(&str, bool)>, PatternError> {
    let Some(inner) = segment.strip_prefix('{') else {
        if segment.contains('{') || segment.contains('}') {
            return Err(PatternError::MalformedParameter(segment.to_string()));
        }
        return Ok(None);
    };
    let inner = inner
        .strip_suffix('}')
        .ok_or_else(|| PatternError::MalformedParameter(segment.to_string()))?;
    let (name, catch_all) = match inner.strip_prefix("**").or_else(|| inner.strip_prefix('*')) {
        Some(name) => (name, true),
        None => (inner, false),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PatternError::MalformedParameter(segment.to_string()));
    }
    Ok(Some((name, catch_all)))
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        let mut catch_all: Option<String> = None;
        let mut seen = Vec::new();

        for segment in trimmed.split('/') {
            if let Some(name) = &catch_all {
                return Err(PatternError::CatchAllNotLast(name.clone()));
            }
            match parse_param(segment)? {
                Some((name, is_catch_all)) => {
                    if seen.contains(&name) {
                        return Err(PatternError::DuplicateParameter(name.to_string()));
                    }
                    seen.push(name);
                    if is_catch_all {
                        catch_all = Some(name.to_string());
                    } else {
                        segments.push(Segment::Param(name.to_string()));
                    }
                }
                None => segments.push(Segment::Literal(segment.to_string())),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            catch_all,
        })
    }
}

impl PathPattern {
    /// Match a request path, returning captured values on success.
    pub fn match_path(&self, path: &str) -> Option<RouteValues> {
        let mut rest = path.trim_start_matches('/');
        let mut values = RouteValues::default();

        for segment in &self.segments {
            if rest.is_empty() {
                return None;
            }
            let (head, tail) = rest.split_once('/').unwrap_or((rest, ""));
            match segment {
                Segment::Literal(literal) if literal.eq_ignore_ascii_case(head) => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if head.is_empty() => return None,
                Segment::Param(name) => values.insert(name, head),
            }
            rest = tail;
        }

        match &self.catch_all {
            Some(name) => {
                values.insert(name, rest);
                Some(values)
            }
            None if rest.is_empty() => Some(values),
            None => None,
        }
    }

    /// Number of literal segments, used for match precedence.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Names of every parameter the pattern captures.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .chain(self.catch_all.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Param(String),
}

/// An upstream path template, rendered from captured route values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl FromStr for PathTemplate {
    type Err = PatternError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = raw
            .trim_start_matches('/')
            .split('/')
            .map(|segment| {
                Ok(match parse_param(segment)? {
                    Some((name, _)) => TemplatePart::Param(name.to_string()),
                    None => TemplatePart::Literal(segment.to_string()),
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }
}

impl PathTemplate {
    /// Ensure every parameter used by the template is captured by `pattern`.
    pub fn check_against(&self, pattern: &PathPattern) -> Result<(), PatternError> {
        for part in &self.parts {
            if let TemplatePart::Param(name) = part {
                if !pattern.parameter_names().any(|p| p == name) {
                    return Err(PatternError::UnknownParameter(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Render an absolute upstream path.
    pub fn render(&self, values: &RouteValues) -> String {
        let mut path = String::from("/");
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                path.push('/');
            }
            match part {
                TemplatePart::Literal(literal) => path.push_str(literal),
                TemplatePart::Param(name) => path.push_str(values.get(name).unwrap_or_default()),
            }
        }
        path
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_all_match() {
        let pattern: PathPattern = "foodservice/{**catchall}".parse().unwrap();

        let values = pattern.match_path("/foodservice/menu/today").unwrap();
        assert_eq!(values.get("catchall"), Some("menu/today"));

        let values = pattern.match_path("/FoodService/menu").unwrap(); // Case insensitive
        assert_eq!(values.get("catchall"), Some("menu"));

        let values = pattern.match_path("/foodservice").unwrap();
        assert_eq!(values.get("catchall"), Some(""));

        assert!(pattern.match_path("/drinkservice/menu").is_none());
        assert!(pattern.match_path("/foodservices/menu").is_none());
    }

    #[test]
    fn test_single_segment_parameter() {
        let pattern: PathPattern = "orders/{id}/items".parse().unwrap();

        let values = pattern.match_path("/orders/42/items").unwrap();
        assert_eq!(values.get("id"), Some("42"));

        assert!(pattern.match_path("/orders//items").is_none());
        assert!(pattern.match_path("/orders/42/items/7").is_none());
        assert_eq!(pattern.literal_count(), 2);
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!("".parse::<PathPattern>(), Err(PatternError::Empty));
        assert!(matches!(
            "a/{**rest}/b".parse::<PathPattern>(),
            Err(PatternError::CatchAllNotLast(_))
        ));
        assert!(matches!(
            "a/{id".parse::<PathPattern>(),
            Err(PatternError::MalformedParameter(_))
        ));
        assert!(matches!(
            "{id}/{id}".parse::<PathPattern>(),
            Err(PatternError::DuplicateParameter(_))
        ));
    }

    #[test]
    fn test_template_render() {
        let pattern: PathPattern = "authenticationservice/{**catchall}".parse().unwrap();
        let values = pattern.match_path("/authenticationservice/login").unwrap();

        let strip: PathTemplate = "{**catchall}".parse().unwrap();
        assert_eq!(strip.render(&values), "/login");

        let prefixed: PathTemplate = "api/{**catchall}".parse().unwrap();
        assert_eq!(prefixed.render(&values), "/api/login");
    }

    #[test]
    fn test_template_unknown_parameter() {
        let pattern: PathPattern = "foodservice/{**catchall}".parse().unwrap();
        let template: PathTemplate = "api/{**rest}".parse().unwrap();
        assert_eq!(
            template.check_against(&pattern),
            Err(PatternError::UnknownParameter("rest".to_string()))
        );
    }
}
