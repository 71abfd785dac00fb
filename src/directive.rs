use crate::error::SpecError;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between the source file and the target table of a load directive.
const INTO: &str = " into ";

/// One executable step of a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    InlineQuery(String),
    FileQuery(PathBuf),
    FileLoad { path: PathBuf, table: String },
    InlinePlan(String),
    FilePlan(PathBuf),
}

/// Substring after the last `.` of the final path component, or `""`.
pub fn extension(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

pub(crate) fn resolve_path(path: &str, base: Option<&Path>) -> PathBuf {
    let p = Path::new(path);
    match base {
        Some(dir) if p.is_relative() => dir.join(p),
        _ => p.to_path_buf(),
    }
}

impl Directive {
    /// Parse a raw suite value. `base` is the directory file references are
    /// resolved against.
    pub fn parse(raw: &Value, base: Option<&Path>) -> Result<Self, SpecError> {
        match raw {
            Value::String(s) => Self::parse_text(s, base),
            Value::Object(map) => match map.get("plan") {
                Some(Value::String(plan)) => Ok(match plan.strip_prefix('@') {
                    Some(file) => Directive::FilePlan(resolve_path(file.trim(), base)),
                    None => Directive::InlinePlan(plan.clone()),
                }),
                _ => Err(SpecError::UnsupportedExecution(raw.to_string())),
            },
            _ => Err(SpecError::UnsupportedExecution(raw.to_string())),
        }
    }

    fn parse_text(s: &str, base: Option<&Path>) -> Result<Self, SpecError> {
        let Some(rest) = s.strip_prefix('@') else {
            return Ok(Directive::InlineQuery(s.to_string()));
        };
        if let Some((target, table)) = rest.split_once(INTO) {
            let (target, table) = (target.trim(), table.trim());
            return match extension(target) {
                "csv" if !table.is_empty() => Ok(Directive::FileLoad {
                    path: resolve_path(target, base),
                    table: table.to_string(),
                }),
                "sql" => Err(SpecError::UnsupportedExecution(format!(
                    "{s} (a query file cannot be loaded into a table)"
                ))),
                _ => Err(SpecError::UnsupportedExecution(s.to_string())),
            };
        }
        let target = rest.trim();
        match extension(target) {
            "sql" => Ok(Directive::FileQuery(resolve_path(target, base))),
            _ => Err(SpecError::UnsupportedExecution(s.to_string())),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::InlineQuery(q) => {
                let q = q.split_whitespace().collect::<Vec<_>>().join(" ");
                write!(f, "{q}")
            }
            Directive::FileQuery(p) => write!(f, "@{}", p.display()),
            Directive::FileLoad { path, table } => {
                write!(f, "@{}{INTO}{table}", path.display())
            }
            Directive::InlinePlan(q) => write!(f, "plan: {}", q.trim()),
            Directive::FilePlan(p) => write!(f, "plan: @{}", p.display()),
        }
    }
}
