//! SQL statement templates
//!
//! Every name and secret interpolated here goes through [`quote_ident`] or
//! [`quote_literal`].

/// Quote an identifier (`"name"`), doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal (`'value'`), doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub const LIST_DATABASES: &str =
    "SELECT datname FROM pg_database WHERE NOT datistemplate ORDER BY datname";

pub const PING: &str = "SELECT 1";

pub fn database_exists(name: &str) -> String {
    format!(
        "SELECT 1 FROM pg_database WHERE datname = {}",
        quote_literal(name)
    )
}

pub fn role_exists(user: &str) -> String {
    format!(
        "SELECT 1 FROM pg_roles WHERE rolname = {}",
        quote_literal(user)
    )
}

/// Create a login role, or reset its password if it already exists.
pub fn ensure_role(user: &str, password: Option<&str>) -> String {
    let with = match password {
        Some(password) => format!("LOGIN PASSWORD {}", quote_literal(password)),
        None => "LOGIN".to_string(),
    };
    let body = format!(
        r#"
BEGIN
    IF NOT EXISTS (SELECT FROM pg_roles WHERE rolname = {name}) THEN
        CREATE ROLE {ident} WITH {with};
    ELSE
        ALTER ROLE {ident} WITH {with};
    END IF;
END
"#,
        name = quote_literal(user),
        ident = quote_ident(user),
        with = with,
    );
    let tag = dollar_tag(&body);
    format!("DO {tag}{body}{tag};\n")
}

/// A `$tag$` delimiter that does not occur in `body`.
fn dollar_tag(body: &str) -> String {
    let mut tag = "$entrypoint$".to_string();
    let mut n = 0;
    while body.contains(&tag) {
        n += 1;
        tag = format!("$entrypoint{}$", n);
    }
    tag
}

pub fn set_password(user: &str, password: &str) -> String {
    format!(
        "ALTER ROLE {} WITH PASSWORD {}",
        quote_ident(user),
        quote_literal(password)
    )
}

/// `CREATE DATABASE` cannot run inside a transaction block, so it is issued
/// on its own after an existence check.
pub fn create_database(name: &str, owner: &str) -> String {
    format!(
        "CREATE DATABASE {} OWNER {}",
        quote_ident(name),
        quote_ident(owner)
    )
}

pub fn grant_all(name: &str, user: &str) -> String {
    format!(
        "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
        quote_ident(name),
        quote_ident(user)
    )
}

pub fn create_extension(extension: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(extension))
}

pub fn terminate_sessions(name: &str) -> String {
    format!(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = {} AND pid <> pg_backend_pid()",
        quote_literal(name)
    )
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE {}", quote_ident(name))
}

pub fn drop_role(user: &str) -> String {
    format!("DROP ROLE {}", quote_ident(user))
}

pub mod self_test {
    pub const EXPECTED_SEED_ROWS: i64 = 3;

    pub const SETUP: &str = r#"DROP TABLE IF EXISTS self_test;
CREATE TABLE self_test (
    id serial PRIMARY KEY,
    value text NOT NULL
);
INSERT INTO self_test (value) VALUES ('alpha'), ('beta'), ('gamma');
"#;

    pub const COUNT: &str = "SELECT count(*) FROM self_test";

    pub const INSERT_PROBE: &str = "INSERT INTO self_test (value) VALUES ('probe')";

    pub const DELETE_PROBE: &str = "DELETE FROM self_test WHERE value = 'probe'";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident("app"), "\"app\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_ensure_role_with_password() {
        let sql = ensure_role("app", Some("it's"));
        assert!(sql.contains("rolname = 'app'"));
        assert!(sql.contains("CREATE ROLE \"app\" WITH LOGIN PASSWORD 'it''s';"));
        assert!(sql.contains("ALTER ROLE \"app\" WITH LOGIN PASSWORD 'it''s';"));
    }

    #[test]
    fn test_ensure_role_tag_avoids_password() {
        let sql = ensure_role("app", Some("x$entrypoint$; DROP TABLE t; --"));
        assert!(sql.starts_with("DO $entrypoint1$\n"));
        assert!(sql.ends_with("END\n$entrypoint1$;\n"));
        assert_eq!(sql.matches("$entrypoint1$").count(), 2);
        assert!(sql.contains("PASSWORD 'x$entrypoint$; DROP TABLE t; --'"));
    }

    #[test]
    fn test_ensure_role_without_password() {
        let sql = ensure_role("app", None);
        assert!(sql.contains("CREATE ROLE \"app\" WITH LOGIN;"));
        assert!(!sql.contains("PASSWORD"));
    }

    #[test]
    fn test_lifecycle_statements() {
        assert_eq!(
            create_database("orders", "app"),
            "CREATE DATABASE \"orders\" OWNER \"app\""
        );
        assert_eq!(drop_database("orders"), "DROP DATABASE \"orders\"");
        assert_eq!(drop_role("app"), "DROP ROLE \"app\"");
        assert_eq!(
            create_extension("uuid-ossp"),
            "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\""
        );
        assert!(terminate_sessions("orders").contains("datname = 'orders'"));
    }
}
