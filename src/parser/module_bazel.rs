//! `MODULE.bazel` parsing (§4.2).
//!
//! The parser recognizes a fixed subset of Python-like call syntax: a
//! sequence of top-level calls `name(kw1 = v1, kw2 = v2, ...)`. It does
//! not evaluate Starlark in the general sense — only the six call forms
//! listed in §4.2 are extracted; anything else is skipped but still
//! counts toward the module-must-come-first ordering rule.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::lexer::{lex, Token};
use crate::error::{ResolveError, Result};
use crate::types::{Dependency, ModuleInfo, Override};
use crate::version::Version;

static BAZEL_COMPAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(>=|<=|>|<|-)\d+\.\d+\.\d+$").unwrap());

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    None_,
    List(Vec<Value>),
}

impl Value {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

struct Statement {
    name: String,
    attrs: HashMap<String, Value>,
}

struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(ResolveError::Parse {
                message: format!("expected {expected:?}, found {other:?}"),
            }),
        }
    }
}

fn parse_value(cur: &mut TokenCursor<'_>) -> Result<Value> {
    match cur.next() {
        Some(Token::Str(s)) => Ok(Value::Str(s.clone())),
        Some(Token::Int(n)) => Ok(Value::Int(*n)),
        Some(Token::True) => Ok(Value::Bool(true)),
        Some(Token::False) => Ok(Value::Bool(false)),
        Some(Token::None_) => Ok(Value::None_),
        Some(Token::LBracket) => {
            let mut items = Vec::new();
            loop {
                if matches!(cur.peek(), Some(Token::RBracket)) {
                    break;
                }
                items.push(parse_value(cur)?);
                if matches!(cur.peek(), Some(Token::Comma)) {
                    cur.next();
                } else {
                    break;
                }
            }
            cur.expect(&Token::RBracket)?;
            Ok(Value::List(items))
        }
        other => Err(ResolveError::Parse {
            message: format!("expected a value, found {other:?}"),
        }),
    }
}

fn parse_statements(tokens: &[Token]) -> Result<Vec<Statement>> {
    let mut cur = TokenCursor { tokens, pos: 0 };
    let mut statements = Vec::new();

    while let Some(tok) = cur.peek() {
        let name = match tok {
            Token::Ident(name) => name.clone(),
            other => {
                return Err(ResolveError::Parse {
                    message: format!("expected a top-level call, found {other:?}"),
                })
            }
        };
        cur.next();
        cur.expect(&Token::LParen)?;

        let mut attrs = HashMap::new();
        loop {
            if matches!(cur.peek(), Some(Token::RParen)) {
                break;
            }
            let key = match cur.next() {
                Some(Token::Ident(k)) => k.clone(),
                other => {
                    return Err(ResolveError::Parse {
                        message: format!("expected a keyword argument name, found {other:?}"),
                    })
                }
            };
            cur.expect(&Token::Eq)?;
            let value = parse_value(&mut cur)?;
            attrs.insert(key, value);

            if matches!(cur.peek(), Some(Token::Comma)) {
                cur.next();
            } else {
                break;
            }
        }
        cur.expect(&Token::RParen)?;

        statements.push(Statement { name, attrs });
    }

    Ok(statements)
}

const RECOGNIZED_CALLS: &[&str] = &[
    "module",
    "bazel_dep",
    "single_version_override",
    "git_override",
    "local_path_override",
    "archive_override",
];

/// Parse a `MODULE.bazel` buffer into a `ModuleInfo`.
pub fn parse(content: &str) -> Result<ModuleInfo> {
    let tokens = lex(content);
    let statements = parse_statements(&tokens)?;

    if statements.is_empty() {
        return Err(ResolveError::Parse {
            message: "empty MODULE.bazel: no module(...) declaration".to_string(),
        });
    }

    let mut module_index: Option<usize> = None;
    for (i, stmt) in statements.iter().enumerate() {
        if stmt.name == "module" {
            if module_index.is_some() {
                return Err(ResolveError::Parse {
                    message: "module(...) may be called at most once".to_string(),
                });
            }
            module_index = Some(i);
        }
    }

    match module_index {
        None => {
            return Err(ResolveError::Parse {
                message: "MODULE.bazel has no module(...) declaration".to_string(),
            })
        }
        Some(0) => {}
        Some(_) => {
            return Err(ResolveError::Parse {
                message: "module(...) must precede every other top-level call".to_string(),
            })
        }
    }

    let module_stmt = &statements[0];
    let name = module_stmt
        .attrs
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let version = Version::parse(
        module_stmt
            .attrs
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(""),
    )?;
    let compatibility_level = module_stmt
        .attrs
        .get("compatibility_level")
        .and_then(Value::as_int)
        .unwrap_or(0)
        .max(0) as u32;

    let bazel_compatibility = parse_bazel_compatibility(module_stmt.attrs.get("bazel_compatibility"))?;

    let mut dependencies = Vec::new();
    let mut overrides = Vec::new();

    for stmt in &statements[1..] {
        if !RECOGNIZED_CALLS.contains(&stmt.name.as_str()) {
            continue;
        }
        match stmt.name.as_str() {
            "bazel_dep" => dependencies.push(parse_bazel_dep(stmt)?),
            "single_version_override" => overrides.push(parse_single_version_override(stmt)?),
            "git_override" => overrides.push(Override::Git {
                module_name: require_module_name(stmt)?,
            }),
            "local_path_override" => overrides.push(Override::LocalPath {
                module_name: require_module_name(stmt)?,
            }),
            "archive_override" => overrides.push(Override::Archive {
                module_name: require_module_name(stmt)?,
            }),
            _ => {}
        }
    }

    Ok(ModuleInfo {
        name,
        version,
        compatibility_level,
        bazel_compatibility,
        dependencies,
        overrides,
    })
}

fn parse_bazel_compatibility(value: Option<&Value>) -> Result<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_list() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let s = item.as_str().ok_or_else(|| ResolveError::Parse {
            message: "bazel_compatibility entries must be strings".to_string(),
        })?;
        if !BAZEL_COMPAT_RE.is_match(s) {
            return Err(ResolveError::Parse {
                message: format!("invalid bazel_compatibility entry '{s}'"),
            });
        }
        out.push(s.to_string());
    }
    Ok(out)
}

fn parse_bazel_dep(stmt: &Statement) -> Result<Dependency> {
    let name = stmt
        .attrs
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResolveError::Parse {
            message: "bazel_dep requires a non-empty name".to_string(),
        })?
        .to_string();
    let version_str = stmt
        .attrs
        .get("version")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResolveError::Parse {
            message: format!("bazel_dep('{name}') requires a non-empty version"),
        })?;
    let version = Version::parse(version_str)?;
    let repo_name = stmt.attrs.get("repo_name").and_then(Value::as_str).map(String::from);
    let dev_dependency = stmt
        .attrs
        .get("dev_dependency")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let max_compat_level = stmt
        .attrs
        .get("max_compatibility_level")
        .and_then(Value::as_int)
        .map(|n| n.max(0) as u32);

    Ok(Dependency {
        name,
        version,
        repo_name,
        dev_dependency,
        max_compat_level,
    })
}

fn parse_single_version_override(stmt: &Statement) -> Result<Override> {
    let module_name = require_module_name(stmt)?;
    let version_str = stmt.attrs.get("version").and_then(Value::as_str).unwrap_or("");
    let version = Version::parse(version_str)?;
    let registry = stmt.attrs.get("registry").and_then(Value::as_str).map(String::from);

    Ok(Override::SingleVersion {
        module_name,
        version,
        registry,
    })
}

fn require_module_name(stmt: &Statement) -> Result<String> {
    stmt.attrs
        .get("module_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| ResolveError::Parse {
            message: format!("{}(...) requires a non-empty module_name", stmt.name),
        })
}
