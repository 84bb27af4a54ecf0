//! Database Test Utilities
//!
//! Provides a PostgreSQL testcontainer with the ledger schema applied, plus
//! helpers to seed the master data the ledger reads. Tests using it need a
//! Docker daemon and are marked `#[ignore]`.

use std::sync::Arc;

use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

use core_kernel::{AdmissionId, CareerId, CycleId, StudentId};
use infra_db::{create_pool, run_migrations, DatabaseConfig};

/// Default PostgreSQL image for testing
const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "tuition_ledger_test";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A wrapper around a PostgreSQL test container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container and applies the migrations
    pub async fn new() -> Result<Self, BoxError> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        // Enough connections for the concurrency tests
        let pool = create_pool(DatabaseConfig {
            max_connections: 16,
            ..DatabaseConfig::new(config.connection_url())
        })
        .await?;

        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data from the database while preserving the schema
    pub async fn clear_data(&self) -> Result<(), BoxError> {
        sqlx::query(
            "TRUNCATE TABLE payments, receivables, enrollments, admissions, careers, areas, cycles, students CASCADE",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn seed_student(&self, first_name: &str, last_name: &str) -> Result<StudentId, BoxError> {
        let id = StudentId::new();
        sqlx::query("INSERT INTO students (id, first_name, last_name) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(first_name)
            .bind(last_name)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn seed_cycle(&self, name: &str) -> Result<CycleId, BoxError> {
        let id = CycleId::new();
        sqlx::query("INSERT INTO cycles (id, name) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    /// Inserts a career, creating its area if needed
    pub async fn seed_career(&self, name: &str, area_name: &str) -> Result<CareerId, BoxError> {
        let area_id: uuid::Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO areas (id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(area_name)
        .fetch_one(&self.pool)
        .await?;

        let id = CareerId::new();
        sqlx::query("INSERT INTO careers (id, name, area_id) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(name)
            .bind(area_id)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn seed_admission(&self, name: &str) -> Result<AdmissionId, BoxError> {
        let id = AdmissionId::new();
        sqlx::query("INSERT INTO admissions (id, name) VALUES ($1, $2)")
            .bind(id.as_uuid())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }
}

/// Global test database for shared integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database() -> Result<TestDatabase, BoxError> {
    TestDatabase::new().await
}
