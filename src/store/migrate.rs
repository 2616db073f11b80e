//! Schema migrations for the round-trip store.
//!
//! Migrations are SQL files named `NNNN_description.sql`. Each file holds the
//! upgrade statements, a separator line, then the downgrade statements:
//!
//! ```sql
//! CREATE TABLE example (id bigserial PRIMARY KEY);
//! ---- create above / drop below ----
//! DROP TABLE example;
//! ```
//!
//! The applied version is tracked in a single-row `db_version` table.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// File names recognised as migrations.
pub static MIGRATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}_.+\.sql$").expect("valid migration pattern"));

/// Line separating upgrade from downgrade statements.
pub const SEPARATOR: &str = "---- create above / drop below ----";

/// Name of the version tracking table.
pub const VERSION_TABLE: &str = "db_version";

/// Errors that can occur while loading or applying migrations
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Could not read migration '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Migration not found: {0}")]
    NotFound(String),

    #[error("Invalid migration file name: {0}")]
    InvalidName(String),

    #[error("Provided value '{0}' is an invalid sequence number")]
    InvalidSequence(i32),

    #[error("Migrations out of order: {0}")]
    OutOfOrder(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

/// A collection of migration files.
pub trait MigrationSource: Send + Sync {
    /// Names of all migration files, sorted.
    fn list(&self) -> Result<Vec<String>, MigrationError>;

    /// Contents of one migration file.
    fn read(&self, name: &str) -> Result<String, MigrationError>;

    /// Migration names matching a shell-style pattern (`*` and `?`).
    fn glob(&self, pattern: &str) -> Result<Vec<String>, MigrationError> {
        let matcher = glob_to_regex(pattern)?;
        Ok(self
            .list()?
            .into_iter()
            .filter(|name| matcher.is_match(name))
            .collect())
    }

    /// Reader over one migration file.
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, MigrationError> {
        let contents = self.read(name)?;
        Ok(Box::new(io::Cursor::new(contents.into_bytes())))
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, MigrationError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

/// Migrations compiled into the binary.
#[derive(Debug, Clone)]
pub struct EmbeddedMigrations {
    files: &'static [(&'static str, &'static str)],
}

const BUILTIN: &[(&str, &str)] = &[(
    "0001_create_remote_api_requests.sql",
    include_str!("../../migrations/0001_create_remote_api_requests.sql"),
)];

impl EmbeddedMigrations {
    /// Use a custom set of `(file name, contents)` pairs.
    pub fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

impl Default for EmbeddedMigrations {
    /// The store's own schema.
    fn default() -> Self {
        Self { files: BUILTIN }
    }
}

impl MigrationSource for EmbeddedMigrations {
    fn list(&self) -> Result<Vec<String>, MigrationError> {
        let mut names: Vec<String> = self
            .files
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| MIGRATION_PATTERN.is_match(name))
            .collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        self.files
            .iter()
            .find(|(file, _)| *file == name)
            .map(|(_, contents)| contents.to_string())
            .ok_or_else(|| MigrationError::NotFound(name.to_string()))
    }
}

/// Migrations read from a directory at runtime.
#[derive(Debug, Clone)]
pub struct DirMigrations {
    dir: PathBuf,
}

impl DirMigrations {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn io_error(&self, name: &str, source: io::Error) -> MigrationError {
        if source.kind() == io::ErrorKind::NotFound {
            MigrationError::NotFound(name.to_string())
        } else {
            MigrationError::Io {
                name: name.to_string(),
                source,
            }
        }
    }
}

impl MigrationSource for DirMigrations {
    fn list(&self) -> Result<Vec<String>, MigrationError> {
        let dir_name = self.dir.display().to_string();
        let entries = fs::read_dir(&self.dir).map_err(|e| self.io_error(&dir_name, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.io_error(&dir_name, e))?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if MIGRATION_PATTERN.is_match(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        fs::read_to_string(self.dir.join(name)).map_err(|e| self.io_error(name, e))
    }

    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>, MigrationError> {
        let file = fs::File::open(self.dir.join(name)).map_err(|e| self.io_error(name, e))?;
        Ok(Box::new(file))
    }
}

/// One parsed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub sequence: i32,
    pub name: String,
    pub up: String,
    pub down: String,
}

impl Migration {
    /// Parse a migration file.
    pub fn parse(file_name: &str, contents: &str) -> Result<Self, MigrationError> {
        if !MIGRATION_PATTERN.is_match(file_name) {
            return Err(MigrationError::InvalidName(file_name.to_string()));
        }
        let sequence: i32 = file_name[..4]
            .parse()
            .map_err(|_| MigrationError::InvalidName(file_name.to_string()))?;
        if sequence <= 0 {
            return Err(MigrationError::InvalidSequence(sequence));
        }

        let (up, down) = match contents.split_once(SEPARATOR) {
            Some((up, down)) => (up, down),
            None => (contents, ""),
        };

        Ok(Self {
            sequence,
            name: file_name.to_string(),
            up: up.trim().to_string(),
            down: down.trim().to_string(),
        })
    }
}

/// Load and validate every migration from a source.
///
/// Sequences must be unique and strictly increasing in file name order.
pub fn load(source: &dyn MigrationSource) -> Result<Vec<Migration>, MigrationError> {
    let mut migrations: Vec<Migration> = Vec::new();
    for name in source.list()? {
        let contents = source.read(&name)?;
        let migration = Migration::parse(&name, &contents)?;
        if let Some(prev) = migrations.last() {
            if migration.sequence <= prev.sequence {
                return Err(MigrationError::OutOfOrder(format!(
                    "{} does not follow {}",
                    migration.name, prev.name
                )));
            }
        }
        migrations.push(migration);
    }
    Ok(migrations)
}

/// Whether a plan moves the schema forwards or backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "upgrade",
            Direction::Down => "downgrade",
        }
    }
}

/// Ordered steps taking the schema from one version to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub from: i32,
    pub to: i32,
    pub direction: Direction,
    pub steps: Vec<Migration>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Compute the steps from `current` to `target`.
///
/// `target` must be 0 or the sequence of a known migration.
pub fn plan(migrations: &[Migration], current: i32, target: i32) -> Result<Plan, MigrationError> {
    if target < 0 || (target != 0 && !migrations.iter().any(|m| m.sequence == target)) {
        return Err(MigrationError::InvalidSequence(target));
    }

    let (direction, steps) = if target >= current {
        let steps = migrations
            .iter()
            .filter(|m| m.sequence > current && m.sequence <= target)
            .cloned()
            .collect();
        (Direction::Up, steps)
    } else {
        let steps = migrations
            .iter()
            .rev()
            .filter(|m| m.sequence <= current && m.sequence > target)
            .cloned()
            .collect();
        (Direction::Down, steps)
    };

    Ok(Plan {
        from: current,
        to: target,
        direction,
        steps,
    })
}

/// One row of a status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub sequence: i32,
    pub name: String,
    pub migrated: bool,
}

/// Status report for a set of migrations against a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    pub current_version: i32,
    pub target_version: i32,
    pub stages: Vec<Stage>,
    /// Table marking the current version with `@` and the stop point with `>`
    pub summary: String,
}

/// Build a status report. `stop_after` defaults to the latest migration.
pub fn summarise(migrations: &[Migration], current: i32, stop_after: Option<i32>) -> MigrationInfo {
    let target = stop_after.unwrap_or_else(|| migrations.last().map_or(0, |m| m.sequence));

    let mut stages = Vec::with_capacity(migrations.len());
    let mut summary = String::new();
    for m in migrations {
        let marker = if m.sequence == current {
            "@ "
        } else if m.sequence == target {
            "> "
        } else {
            "  "
        };
        let _ = writeln!(summary, "{:>2} {:>3} {}", marker, m.sequence, m.name);
        stages.push(Stage {
            sequence: m.sequence,
            name: m.name.clone(),
            migrated: m.sequence <= current,
        });
    }

    MigrationInfo {
        current_version: current,
        target_version: target,
        stages,
        summary,
    }
}

/// Something that can bring a schema up to date and report on it.
#[async_trait::async_trait]
pub trait MigrationRunner: Send + Sync {
    /// Apply every pending migration.
    async fn apply_all(&self) -> Result<(), MigrationError>;

    /// Report the current version and each migration's state.
    async fn status(&self, stop_after: Option<i32>) -> Result<MigrationInfo, MigrationError>;
}

#[cfg(feature = "postgres")]
pub use pg::Migrator;

#[cfg(feature = "postgres")]
mod pg {
    use async_trait::async_trait;
    use deadpool_postgres::Pool;

    use super::*;

    /// Applies migrations to Postgres, one transaction per step.
    pub struct Migrator {
        pool: Pool,
        migrations: Vec<Migration>,
    }

    impl Migrator {
        pub fn new(pool: Pool, source: &dyn MigrationSource) -> Result<Self, MigrationError> {
            Ok(Self {
                pool,
                migrations: load(source)?,
            })
        }

        pub fn migrations(&self) -> &[Migration] {
            &self.migrations
        }

        /// Latest known sequence, or 0 when there are no migrations.
        pub fn latest(&self) -> i32 {
            self.migrations.last().map_or(0, |m| m.sequence)
        }

        async fn ensure_version_table(&self, client: &tokio_postgres::Client) -> Result<(), MigrationError> {
            client
                .batch_execute(&format!(
                    "CREATE TABLE IF NOT EXISTS {VERSION_TABLE} (version integer NOT NULL);
                     INSERT INTO {VERSION_TABLE} (version)
                         SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM {VERSION_TABLE});"
                ))
                .await?;
            Ok(())
        }

        pub async fn current_version(&self) -> Result<i32, MigrationError> {
            let client = self.pool.get().await?;
            self.ensure_version_table(&client).await?;
            let row = client
                .query_one(&format!("SELECT version FROM {VERSION_TABLE}"), &[])
                .await?;
            Ok(row.get(0))
        }

        /// Move the schema to `target`, upgrading or downgrading as needed.
        pub async fn migrate_to(&self, target: i32) -> Result<(), MigrationError> {
            let current = self.current_version().await?;
            let plan = plan(&self.migrations, current, target)?;
            if plan.is_empty() {
                tracing::debug!(version = current, "Schema already at target version");
                return Ok(());
            }

            tracing::info!(
                direction = plan.direction.as_str(),
                from = plan.from,
                to = plan.to,
                "Starting schema migration"
            );

            let mut object = self.pool.get().await?;
            let client: &mut tokio_postgres::Client = &mut object;

            for step in &plan.steps {
                let (sql, version) = match plan.direction {
                    Direction::Up => (&step.up, step.sequence),
                    Direction::Down => (&step.down, self.previous(step.sequence)),
                };

                tracing::info!(
                    sequence = step.sequence,
                    name = %step.name,
                    direction = plan.direction.as_str(),
                    "Applying migration"
                );

                let tx = client.transaction().await?;
                if !sql.is_empty() {
                    tx.batch_execute(sql).await?;
                }
                tx.execute(&format!("UPDATE {VERSION_TABLE} SET version = $1"), &[&version])
                    .await?;
                tx.commit().await?;
            }

            Ok(())
        }

        /// Sequence preceding `sequence`, or 0.
        fn previous(&self, sequence: i32) -> i32 {
            self.migrations
                .iter()
                .map(|m| m.sequence)
                .filter(|s| *s < sequence)
                .max()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl MigrationRunner for Migrator {
        async fn apply_all(&self) -> Result<(), MigrationError> {
            self.migrate_to(self.latest()).await
        }

        async fn status(&self, stop_after: Option<i32>) -> Result<MigrationInfo, MigrationError> {
            let current = self.current_version().await?;
            Ok(summarise(&self.migrations, current, stop_after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIXTURES: &[(&str, &str)] = &[
        ("0001_first.sql", "CREATE TABLE a ();\n---- create above / drop below ----\nDROP TABLE a;"),
        ("0002_second.sql", "CREATE TABLE b ();\n---- create above / drop below ----\nDROP TABLE b;"),
        ("0003_third.sql", "CREATE TABLE c ();"),
        ("README.md", "not a migration"),
    ];

    fn fixtures() -> Vec<Migration> {
        load(&EmbeddedMigrations::new(FIXTURES)).unwrap()
    }

    #[test]
    fn test_pattern() {
        assert!(MIGRATION_PATTERN.is_match("0001_create.sql"));
        assert!(!MIGRATION_PATTERN.is_match("001_create.sql"));
        assert!(!MIGRATION_PATTERN.is_match("0001_create.txt"));
        assert!(!MIGRATION_PATTERN.is_match("0001_.sql"));
    }

    #[test]
    fn test_builtin_schema_loads() {
        let migrations = load(&EmbeddedMigrations::default()).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].sequence, 1);
        assert!(migrations[0].up.contains("remote_api_requests"));
        assert!(migrations[0].down.contains("DROP TABLE"));
    }

    #[test]
    fn test_parse_splits_sections() {
        let m = Migration::parse("0002_second.sql", FIXTURES[1].1).unwrap();
        assert_eq!(m.sequence, 2);
        assert_eq!(m.up, "CREATE TABLE b ();");
        assert_eq!(m.down, "DROP TABLE b;");
    }

    #[test]
    fn test_parse_without_separator() {
        let m = Migration::parse("0003_third.sql", FIXTURES[2].1).unwrap();
        assert_eq!(m.up, "CREATE TABLE c ();");
        assert!(m.down.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!(matches!(
            Migration::parse("first.sql", ""),
            Err(MigrationError::InvalidName(_))
        ));
        assert!(matches!(
            Migration::parse("0000_zero.sql", ""),
            Err(MigrationError::InvalidSequence(0))
        ));
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let source = EmbeddedMigrations::new(FIXTURES);
        assert_eq!(
            source.list().unwrap(),
            vec!["0001_first.sql", "0002_second.sql", "0003_third.sql"]
        );
    }

    #[test]
    fn test_glob() {
        let source = EmbeddedMigrations::new(FIXTURES);
        assert_eq!(source.glob("000?_s*.sql").unwrap(), vec!["0002_second.sql"]);
        assert_eq!(source.glob("*.sql").unwrap().len(), 3);
        assert!(source.glob("*.md").unwrap().is_empty());
    }

    #[test]
    fn test_open_reads_contents() {
        let source = EmbeddedMigrations::new(FIXTURES);
        let mut contents = String::new();
        source
            .open("0003_third.sql")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "CREATE TABLE c ();");
    }

    #[test]
    fn test_read_missing() {
        let source = EmbeddedMigrations::new(FIXTURES);
        assert!(matches!(
            source.read("0009_missing.sql"),
            Err(MigrationError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_sequence_rejected() {
        static DUPES: &[(&str, &str)] = &[("0001_a.sql", ""), ("0001_b.sql", "")];
        assert!(matches!(
            load(&EmbeddedMigrations::new(DUPES)),
            Err(MigrationError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_plan_upgrade() {
        let migrations = fixtures();
        let plan = plan(&migrations, 0, 3).unwrap();
        assert_eq!(plan.direction, Direction::Up);
        let seqs: Vec<_> = plan.steps.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_plan_downgrade() {
        let migrations = fixtures();
        let plan = plan(&migrations, 3, 1).unwrap();
        assert_eq!(plan.direction, Direction::Down);
        assert_eq!(plan.direction.as_str(), "downgrade");
        let seqs: Vec<_> = plan.steps.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![3, 2]);
    }

    #[test]
    fn test_plan_noop_and_invalid() {
        let migrations = fixtures();
        assert!(plan(&migrations, 2, 2).unwrap().is_empty());
        assert!(matches!(
            plan(&migrations, 0, 7),
            Err(MigrationError::InvalidSequence(7))
        ));
        assert!(matches!(
            plan(&migrations, 0, -1),
            Err(MigrationError::InvalidSequence(-1))
        ));
    }

    #[test]
    fn test_summarise_marks_rows() {
        let migrations = fixtures();
        let info = summarise(&migrations, 1, Some(2));

        assert_eq!(info.current_version, 1);
        assert_eq!(info.target_version, 2);
        assert_eq!(
            info.summary,
            "@    1 0001_first.sql\n>    2 0002_second.sql\n     3 0003_third.sql\n"
        );
        let migrated: Vec<_> = info.stages.iter().map(|s| s.migrated).collect();
        assert_eq!(migrated, vec![true, false, false]);
    }

    #[test]
    fn test_summarise_defaults_to_latest() {
        let info = summarise(&fixtures(), 0, None);
        assert_eq!(info.target_version, 3);
        assert!(info.summary.ends_with(">    3 0003_third.sql\n"));
    }
}
