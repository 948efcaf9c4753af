//! Keyword names and signatures.
//!
//! Names match the way table-driven test runners match them: case is
//! ignored, as are spaces and underscores, so `Execute Sql String`,
//! `execute_sql_string` and `EXECUTESQLSTRING` are the same keyword.

use serde::Serialize;

/// Identifies a keyword for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordId {
    ConnectToPostgresql,
    ConnectToPostgresqlUsingUrl,
    DisconnectFromPostgresql,
    CloseAllPostgresqlConnections,
    SwitchPostgresqlConnection,
    GetPostgresqlConnections,
    ExecuteSqlString,
    ExecuteSqlStringMapped,
    ExecutePlpgsqlBlock,
    ExecutePlpgsqlScript,
    CommitPostgresqlTransaction,
    RollbackPostgresqlTransaction,
    SetPostgresqlAutocommit,
}

/// One declared argument.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    /// Default shown to callers; `None` means the argument is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
}

const fn required(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        default: None,
    }
}

const fn optional(name: &'static str, default: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        default: Some(default),
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct KeywordSpec {
    #[serde(skip)]
    pub id: KeywordId,
    pub name: &'static str,
    pub args: &'static [ArgSpec],
    /// Name of the `**kwargs` catch-all, if the keyword has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kwargs: Option<&'static str>,
    pub doc: &'static str,
}

impl KeywordSpec {
    /// Argument list in runner notation: `name`, `name=default`, `**kwargs`.
    pub fn signature(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .args
            .iter()
            .map(|a| match a.default {
                Some(d) => format!("{}={}", a.name, d),
                None => a.name.to_string(),
            })
            .collect();
        if let Some(kwargs) = self.kwargs {
            out.push(format!("**{kwargs}"));
        }
        out
    }
}

pub static KEYWORDS: &[KeywordSpec] = &[
    KeywordSpec {
        id: KeywordId::ConnectToPostgresql,
        name: "Connect To Postgresql",
        args: &[
            required("dbname"),
            required("dbusername"),
            required("dbpassword"),
            optional("dbhost", "None"),
            optional("dbport", "None"),
            optional("alias", "None"),
            optional("autocommit", "False"),
        ],
        kwargs: Some("options"),
        doc: "Open a connection and make it current. Returns its index. \
              Extra named arguments (sslmode, application_name, server settings) \
              are passed as connection options.",
    },
    KeywordSpec {
        id: KeywordId::ConnectToPostgresqlUsingUrl,
        name: "Connect To Postgresql Using Url",
        args: &[
            required("url"),
            optional("alias", "None"),
            optional("autocommit", "False"),
        ],
        kwargs: None,
        doc: "Open a connection from a postgres:// URL and make it current. Returns its index.",
    },
    KeywordSpec {
        id: KeywordId::DisconnectFromPostgresql,
        name: "Disconnect From Postgresql",
        args: &[optional("alias", "None")],
        kwargs: None,
        doc: "Close the connection with the given alias or index, or the current one.",
    },
    KeywordSpec {
        id: KeywordId::CloseAllPostgresqlConnections,
        name: "Close All Postgresql Connections",
        args: &[],
        kwargs: None,
        doc: "Close every open connection. Index numbering starts again at 1.",
    },
    KeywordSpec {
        id: KeywordId::SwitchPostgresqlConnection,
        name: "Switch Postgresql Connection",
        args: &[required("index_or_alias")],
        kwargs: None,
        doc: "Make another open connection current. Returns the previous index.",
    },
    KeywordSpec {
        id: KeywordId::GetPostgresqlConnections,
        name: "Get Postgresql Connections",
        args: &[],
        kwargs: None,
        doc: "List open connections (index, alias, host, database, user, state).",
    },
    KeywordSpec {
        id: KeywordId::ExecuteSqlString,
        name: "Execute Sql String",
        args: &[required("plpgsqlstatement")],
        kwargs: Some("params"),
        doc: "Execute SQL. Returns rows as lists for row-returning statements, \
              otherwise the affected-row count. Named arguments fill %(name)s \
              placeholders; `alias` selects the connection.",
    },
    KeywordSpec {
        id: KeywordId::ExecuteSqlStringMapped,
        name: "Execute Sql String Mapped",
        args: &[required("plpgsqlstatement")],
        kwargs: Some("params"),
        doc: "Execute SQL and return rows as column-name maps.",
    },
    KeywordSpec {
        id: KeywordId::ExecutePlpgsqlBlock,
        name: "Execute Plpgsql Block",
        args: &[required("plpgsqlstatement")],
        kwargs: Some("params"),
        doc: "Execute SQL and commit. Rolls back if execution fails.",
    },
    KeywordSpec {
        id: KeywordId::ExecutePlpgsqlScript,
        name: "Execute Plpgsql Script",
        args: &[required("file_path")],
        kwargs: Some("params"),
        doc: "Read a SQL file and execute it as a block.",
    },
    KeywordSpec {
        id: KeywordId::CommitPostgresqlTransaction,
        name: "Commit Postgresql Transaction",
        args: &[optional("alias", "None")],
        kwargs: None,
        doc: "Commit the open transaction.",
    },
    KeywordSpec {
        id: KeywordId::RollbackPostgresqlTransaction,
        name: "Rollback Postgresql Transaction",
        args: &[optional("alias", "None")],
        kwargs: None,
        doc: "Roll back the open transaction.",
    },
    KeywordSpec {
        id: KeywordId::SetPostgresqlAutocommit,
        name: "Set Postgresql Autocommit",
        args: &[required("autocommit"), optional("alias", "None")],
        kwargs: None,
        doc: "Switch autocommit mode. Returns the previous value.",
    },
];

/// Fold a keyword name to its matching form.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up a keyword by any spelling of its name.
pub fn find(name: &str) -> Option<&'static KeywordSpec> {
    let wanted = normalize_name(name);
    KEYWORDS.iter().find(|k| normalize_name(k.name) == wanted)
}

pub fn names() -> Vec<&'static str> {
    KEYWORDS.iter().map(|k| k.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_ignores_case_spaces_and_underscores() {
        for spelling in [
            "Execute Sql String",
            "execute_sql_string",
            "EXECUTESQLSTRING",
            "  execute  SQL_string ",
        ] {
            assert_eq!(
                find(spelling).map(|k| k.id),
                Some(KeywordId::ExecuteSqlString),
                "{spelling}"
            );
        }
    }

    #[test]
    fn test_find_distinguishes_similar_names() {
        assert_eq!(
            find("execute sql string mapped").map(|k| k.id),
            Some(KeywordId::ExecuteSqlStringMapped)
        );
        assert_eq!(
            find("Connect To Postgresql Using Url").map(|k| k.id),
            Some(KeywordId::ConnectToPostgresqlUsingUrl)
        );
        assert!(find("Execute Sql").is_none());
    }

    #[test]
    fn test_names_are_unique_after_normalization() {
        let mut seen = std::collections::HashSet::new();
        for k in KEYWORDS {
            assert!(seen.insert(normalize_name(k.name)), "{}", k.name);
        }
        assert_eq!(names().len(), 13);
    }

    #[test]
    fn test_signature() {
        let spec = find("Connect To Postgresql").unwrap();
        assert_eq!(
            spec.signature(),
            vec![
                "dbname",
                "dbusername",
                "dbpassword",
                "dbhost=None",
                "dbport=None",
                "alias=None",
                "autocommit=False",
                "**options",
            ]
        );
        assert_eq!(
            find("Execute Plpgsql Script").unwrap().signature(),
            vec!["file_path", "**params"]
        );
    }
}
