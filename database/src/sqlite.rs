use crate::common::{
    dep_type_to_string, entity_type_to_string, priority_to_string, role_to_string,
    row_to_dependency, row_to_feature, row_to_project, row_to_task, row_to_transition,
    sqlx_error_to_store_error, tags_to_json, threshold_to_string,
};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        ContainerType, Dependency, Feature, FeatureQuery, NewDependency, NewFeature, NewProject,
        NewTask, Project, ProjectQuery, RoleTransition, Task, TaskQuery, UpdateFeature,
        UpdateProject, UpdateTask, WorkTreeCreated, WorkTreeSpec,
    },
    repository::{EdgeDirection, EntityStore, StoreStats},
};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// SQLite implementation of the EntityStore trait
///
/// Connection pooling, WAL journaling, foreign keys ON, and embedded
/// migrations. Compound writes run in explicit transactions.
#[derive(Debug, Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Create a new SQLite store with the given database URL
    ///
    /// # Arguments
    /// * `database_url` - SQLite database URL (file path or `:memory:`)
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") {
            database_url.to_string()
        } else if database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false)
        {
            match Sqlite::create_database(&db_url).await {
                Ok(_) => tracing::info!("Database created successfully"),
                Err(error) => {
                    tracing::error!("Error creating database: {}", error);
                    return Err(OrchestratorError::store(format!(
                        "Failed to create database: {error}"
                    )));
                }
            }
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_store_error)?;

        Ok(Self { pool })
    }

    /// Apply all pending migrations. Call once after construction.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| OrchestratorError::store(format!("Migration failed: {e}")))?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }

    /// Direct pool access for test scenarios needing raw SQL.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_project(
        executor: &mut sqlx::SqliteConnection,
        project: &NewProject,
        status: &str,
    ) -> Result<Project> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, name, summary, status, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, summary, status, tags, created_at, modified_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&project.name)
        .bind(&project.summary)
        .bind(status)
        .bind(tags_to_json(&project.tags))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *executor)
        .await
        .map_err(sqlx_error_to_store_error)?;
        row_to_project(&row)
    }

    async fn insert_feature(
        executor: &mut sqlx::SqliteConnection,
        feature: &NewFeature,
        status: &str,
    ) -> Result<Feature> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO features
                (id, project_id, name, summary, description, status, priority, tags,
                 requires_verification, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, project_id, name, summary, description, status, priority, tags,
                      requires_verification, created_at, modified_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(feature.project_id.map(|id| id.to_string()))
        .bind(&feature.name)
        .bind(&feature.summary)
        .bind(&feature.description)
        .bind(status)
        .bind(priority_to_string(feature.priority))
        .bind(tags_to_json(&feature.tags))
        .bind(feature.requires_verification as i64)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *executor)
        .await
        .map_err(sqlx_error_to_store_error)?;
        row_to_feature(&row)
    }

    async fn insert_task(
        executor: &mut sqlx::SqliteConnection,
        task: &NewTask,
        status: &str,
    ) -> Result<Task> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO tasks
                (id, feature_id, title, summary, description, status, priority, complexity,
                 tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, feature_id, title, summary, description, status, priority, complexity,
                      tags, created_at, modified_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(task.feature_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.summary)
        .bind(&task.description)
        .bind(status)
        .bind(priority_to_string(task.priority))
        .bind(task.complexity.map(|c| c as i64))
        .bind(tags_to_json(&task.tags))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *executor)
        .await
        .map_err(sqlx_error_to_store_error)?;
        row_to_task(&row)
    }

    async fn insert_dependency(
        executor: &mut sqlx::SqliteConnection,
        dep: &NewDependency,
    ) -> Result<Dependency> {
        let row = sqlx::query(
            r#"
            INSERT INTO dependencies (id, from_task, to_task, dep_type, unblock_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, from_task, to_task, dep_type, unblock_at, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(dep.from_task.to_string())
        .bind(dep.to_task.to_string())
        .bind(dep_type_to_string(dep.dep_type))
        .bind(dep.unblock_at.map(threshold_to_string))
        .bind(Utc::now())
        .fetch_one(&mut *executor)
        .await
        .map_err(|e| match sqlx_error_to_store_error(e) {
            OrchestratorError::DuplicateDependency { .. } => {
                OrchestratorError::DuplicateDependency {
                    from: dep.from_task,
                    to: dep.to_task,
                }
            }
            other => other,
        })?;
        row_to_dependency(&row)
    }

    /// Remove audit rows and sections owned by a set of entity ids. No FK
    /// covers these tables, so cascades clean them explicitly.
    async fn purge_owned_rows(
        executor: &mut sqlx::SqliteConnection,
        entity_ids: &[String],
    ) -> Result<()> {
        for id in entity_ids {
            sqlx::query("DELETE FROM role_transitions WHERE entity_id = ?")
                .bind(id)
                .execute(&mut *executor)
                .await
                .map_err(sqlx_error_to_store_error)?;
            sqlx::query("DELETE FROM sections WHERE entity_id = ?")
                .bind(id)
                .execute(&mut *executor)
                .await
                .map_err(sqlx_error_to_store_error)?;
        }
        Ok(())
    }

    fn table_for(entity_type: ContainerType) -> &'static str {
        match entity_type {
            ContainerType::Project => "projects",
            ContainerType::Feature => "features",
            ContainerType::Task => "tasks",
        }
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn create_project(&self, project: NewProject, status: String) -> Result<Project> {
        let mut conn = self.pool.acquire().await.map_err(sqlx_error_to_store_error)?;
        Self::insert_project(&mut conn, &project, &status).await
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        row.as_ref().map(row_to_project).transpose()
    }

    async fn list_projects(&self, query: ProjectQuery) -> Result<Vec<Project>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> =
            sqlx::QueryBuilder::new("SELECT * FROM projects WHERE 1=1");
        if let Some(ref status) = query.status {
            builder.push(" AND LOWER(status) = LOWER(");
            builder.push_bind(status);
            builder.push(")");
        }
        if let Some(ref tag) = query.tag {
            builder.push(" AND LOWER(tags) LIKE ");
            builder.push_bind(format!("%\"{}\"%", tag.to_lowercase()));
        }
        if let Some(ref text) = query.text {
            builder.push(" AND (name LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(" OR summary LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(")");
        }
        builder.push(" ORDER BY created_at ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_project).collect()
    }

    async fn update_project(&self, id: Uuid, updates: UpdateProject) -> Result<Project> {
        let Some(mut project) = self.get_project(id).await? else {
            return Err(OrchestratorError::not_found(ContainerType::Project, id));
        };
        if let Some(name) = updates.name {
            project.name = name;
        }
        if let Some(summary) = updates.summary {
            project.summary = summary;
        }
        if let Some(tags) = updates.tags {
            project.tags = tags;
        }
        let now = Utc::now();
        sqlx::query(
            "UPDATE projects SET name = ?, summary = ?, tags = ?, modified_at = ? WHERE id = ?",
        )
        .bind(&project.name)
        .bind(&project.summary)
        .bind(tags_to_json(&project.tags))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_store_error)?;
        project.modified_at = now;
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_store_error)?;

        let mut owned: Vec<String> = vec![id.to_string()];
        let feature_rows = sqlx::query("SELECT id FROM features WHERE project_id = ?")
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(sqlx_error_to_store_error)?;
        for row in &feature_rows {
            let feature_id: String = row.get("id");
            let task_rows = sqlx::query("SELECT id FROM tasks WHERE feature_id = ?")
                .bind(&feature_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(sqlx_error_to_store_error)?;
            for task_row in &task_rows {
                owned.push(task_row.get("id"));
            }
            owned.push(feature_id);
        }

        Self::purge_owned_rows(&mut tx, &owned).await?;

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_store_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(ContainerType::Project, id));
        }

        tx.commit().await.map_err(sqlx_error_to_store_error)?;
        Ok(())
    }

    async fn create_feature(&self, feature: NewFeature, status: String) -> Result<Feature> {
        if let Some(project_id) = feature.project_id {
            if self.get_project(project_id).await?.is_none() {
                return Err(OrchestratorError::not_found(
                    ContainerType::Project,
                    project_id,
                ));
            }
        }
        let mut conn = self.pool.acquire().await.map_err(sqlx_error_to_store_error)?;
        Self::insert_feature(&mut conn, &feature, &status).await
    }

    async fn get_feature(&self, id: Uuid) -> Result<Option<Feature>> {
        let row = sqlx::query("SELECT * FROM features WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        row.as_ref().map(row_to_feature).transpose()
    }

    async fn list_features(&self, query: FeatureQuery) -> Result<Vec<Feature>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> =
            sqlx::QueryBuilder::new("SELECT * FROM features WHERE 1=1");
        if let Some(project_id) = query.project_id {
            builder.push(" AND project_id = ");
            builder.push_bind(project_id.to_string());
        }
        if let Some(ref status) = query.status {
            builder.push(" AND LOWER(status) = LOWER(");
            builder.push_bind(status);
            builder.push(")");
        }
        if let Some(priority) = query.priority {
            builder.push(" AND priority = ");
            builder.push_bind(priority_to_string(priority));
        }
        if let Some(ref tag) = query.tag {
            builder.push(" AND LOWER(tags) LIKE ");
            builder.push_bind(format!("%\"{}\"%", tag.to_lowercase()));
        }
        if let Some(ref text) = query.text {
            builder.push(" AND (name LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(" OR description LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(")");
        }
        builder.push(" ORDER BY created_at ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_feature).collect()
    }

    async fn features_of_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
        let rows =
            sqlx::query("SELECT * FROM features WHERE project_id = ? ORDER BY created_at ASC")
                .bind(project_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_feature).collect()
    }

    async fn update_feature(&self, id: Uuid, updates: UpdateFeature) -> Result<Feature> {
        let Some(mut feature) = self.get_feature(id).await? else {
            return Err(OrchestratorError::not_found(ContainerType::Feature, id));
        };
        if let Some(project_id) = updates.project_id {
            feature.project_id = project_id;
        }
        if let Some(name) = updates.name {
            feature.name = name;
        }
        if let Some(summary) = updates.summary {
            feature.summary = summary;
        }
        if let Some(description) = updates.description {
            feature.description = description;
        }
        if let Some(priority) = updates.priority {
            feature.priority = priority;
        }
        if let Some(tags) = updates.tags {
            feature.tags = tags;
        }
        if let Some(requires_verification) = updates.requires_verification {
            feature.requires_verification = requires_verification;
        }
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE features
            SET project_id = ?, name = ?, summary = ?, description = ?, priority = ?,
                tags = ?, requires_verification = ?, modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(feature.project_id.map(|p| p.to_string()))
        .bind(&feature.name)
        .bind(&feature.summary)
        .bind(&feature.description)
        .bind(priority_to_string(feature.priority))
        .bind(tags_to_json(&feature.tags))
        .bind(feature.requires_verification as i64)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_store_error)?;
        feature.modified_at = now;
        Ok(feature)
    }

    async fn delete_feature(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_store_error)?;

        let mut owned: Vec<String> = vec![id.to_string()];
        let task_rows = sqlx::query("SELECT id FROM tasks WHERE feature_id = ?")
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(sqlx_error_to_store_error)?;
        for row in &task_rows {
            owned.push(row.get("id"));
        }
        Self::purge_owned_rows(&mut tx, &owned).await?;

        let result = sqlx::query("DELETE FROM features WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_store_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(ContainerType::Feature, id));
        }

        tx.commit().await.map_err(sqlx_error_to_store_error)?;
        Ok(())
    }

    async fn create_task(&self, task: NewTask, status: String) -> Result<Task> {
        if let Some(feature_id) = task.feature_id {
            if self.get_feature(feature_id).await?.is_none() {
                return Err(OrchestratorError::not_found(
                    ContainerType::Feature,
                    feature_id,
                ));
            }
        }
        let mut conn = self.pool.acquire().await.map_err(sqlx_error_to_store_error)?;
        Self::insert_task(&mut conn, &task, &status).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> =
            sqlx::QueryBuilder::new("SELECT t.* FROM tasks t");
        if query.project_id.is_some() {
            builder.push(" JOIN features f ON t.feature_id = f.id");
        }
        builder.push(" WHERE 1=1");
        if let Some(feature_id) = query.feature_id {
            builder.push(" AND t.feature_id = ");
            builder.push_bind(feature_id.to_string());
        }
        if let Some(project_id) = query.project_id {
            builder.push(" AND f.project_id = ");
            builder.push_bind(project_id.to_string());
        }
        if let Some(ref status) = query.status {
            builder.push(" AND LOWER(t.status) = LOWER(");
            builder.push_bind(status);
            builder.push(")");
        }
        if let Some(priority) = query.priority {
            builder.push(" AND t.priority = ");
            builder.push_bind(priority_to_string(priority));
        }
        if let Some(ref tag) = query.tag {
            builder.push(" AND LOWER(t.tags) LIKE ");
            builder.push_bind(format!("%\"{}\"%", tag.to_lowercase()));
        }
        if let Some(ref text) = query.text {
            builder.push(" AND (t.title LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(" OR t.description LIKE ");
            builder.push_bind(format!("%{text}%"));
            builder.push(")");
        }
        builder.push(" ORDER BY t.created_at ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn tasks_of_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE feature_id = ? ORDER BY created_at ASC")
            .bind(feature_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn update_task(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        let Some(mut task) = self.get_task(id).await? else {
            return Err(OrchestratorError::not_found(ContainerType::Task, id));
        };
        if let Some(feature_id) = updates.feature_id {
            task.feature_id = feature_id;
        }
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(summary) = updates.summary {
            task.summary = summary;
        }
        if let Some(description) = updates.description {
            task.description = description;
        }
        if let Some(priority) = updates.priority {
            task.priority = priority;
        }
        if let Some(complexity) = updates.complexity {
            task.complexity = complexity;
        }
        if let Some(tags) = updates.tags {
            task.tags = tags;
        }
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE tasks
            SET feature_id = ?, title = ?, summary = ?, description = ?, priority = ?,
                complexity = ?, tags = ?, modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(task.feature_id.map(|f| f.to_string()))
        .bind(&task.title)
        .bind(&task.summary)
        .bind(&task.description)
        .bind(priority_to_string(task.priority))
        .bind(task.complexity.map(|c| c as i64))
        .bind(tags_to_json(&task.tags))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_store_error)?;
        task.modified_at = now;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_store_error)?;
        Self::purge_owned_rows(&mut tx, &[id.to_string()]).await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_store_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(ContainerType::Task, id));
        }
        tx.commit().await.map_err(sqlx_error_to_store_error)?;
        Ok(())
    }

    async fn set_status(
        &self,
        entity_type: ContainerType,
        id: Uuid,
        status: String,
    ) -> Result<()> {
        let table = Self::table_for(entity_type);
        let sql = format!("UPDATE {table} SET status = ?, modified_at = ? WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(&status)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found(entity_type, id));
        }
        Ok(())
    }

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency> {
        let mut conn = self.pool.acquire().await.map_err(sqlx_error_to_store_error)?;
        Self::insert_dependency(&mut conn, &dep).await
    }

    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>> {
        let row = sqlx::query("SELECT * FROM dependencies WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        row.as_ref().map(row_to_dependency).transpose()
    }

    async fn delete_dependency(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::NotFound(
                ContainerType::Task,
                format!("dependency {id}"),
            ));
        }
        Ok(())
    }

    async fn dependencies_for(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>> {
        let id = task_id.to_string();
        let sql = match direction {
            EdgeDirection::Incoming => {
                "SELECT * FROM dependencies WHERE to_task = ? ORDER BY created_at ASC"
            }
            EdgeDirection::Outgoing => {
                "SELECT * FROM dependencies WHERE from_task = ? ORDER BY created_at ASC"
            }
            EdgeDirection::Both => {
                "SELECT * FROM dependencies WHERE from_task = ?1 OR to_task = ?1 ORDER BY created_at ASC"
            }
        };
        let rows = sqlx::query(sql)
            .bind(&id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_dependency).collect()
    }

    async fn find_blocking_edges(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>> {
        let id = task_id.to_string();
        // "Incoming" means edges whose blocked endpoint is this task:
        // BLOCKS rows pointing at it plus IS_BLOCKED_BY rows leaving it.
        let sql = match direction {
            EdgeDirection::Incoming => {
                r#"SELECT * FROM dependencies
                   WHERE (dep_type = 'BLOCKS' AND to_task = ?1)
                      OR (dep_type = 'IS_BLOCKED_BY' AND from_task = ?1)
                   ORDER BY created_at ASC"#
            }
            EdgeDirection::Outgoing => {
                r#"SELECT * FROM dependencies
                   WHERE (dep_type = 'BLOCKS' AND from_task = ?1)
                      OR (dep_type = 'IS_BLOCKED_BY' AND to_task = ?1)
                   ORDER BY created_at ASC"#
            }
            EdgeDirection::Both => {
                r#"SELECT * FROM dependencies
                   WHERE dep_type IN ('BLOCKS', 'IS_BLOCKED_BY')
                     AND (from_task = ?1 OR to_task = ?1)
                   ORDER BY created_at ASC"#
            }
        };
        let rows = sqlx::query(sql)
            .bind(&id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_dependency).collect()
    }

    async fn append_transition(&self, record: RoleTransition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_transitions
                (id, entity_id, entity_type, from_role, to_role, from_status, to_status,
                 triggered_by, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.entity_id.to_string())
        .bind(entity_type_to_string(record.entity_type))
        .bind(role_to_string(record.from_role))
        .bind(role_to_string(record.to_role))
        .bind(&record.from_status)
        .bind(&record.to_status)
        .bind(&record.trigger)
        .bind(&record.summary)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_store_error)?;
        Ok(())
    }

    async fn transitions_for(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
        let rows = sqlx::query(
            "SELECT * FROM role_transitions WHERE entity_id = ? ORDER BY created_at ASC",
        )
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_store_error)?;
        rows.iter().map(row_to_transition).collect()
    }

    async fn count_transitions(&self, entity_id: Uuid) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM role_transitions WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn count_sections(&self, entity_id: Uuid) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sections WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn create_work_tree(
        &self,
        spec: WorkTreeSpec,
        project_status: String,
        feature_statuses: Vec<String>,
        task_statuses: Vec<String>,
    ) -> Result<WorkTreeCreated> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_store_error)?;
        let mut created = WorkTreeCreated::default();

        let project_id = match &spec.project {
            Some(project) => {
                let project = Self::insert_project(&mut tx, project, &project_status).await?;
                created.project_id = Some(project.id);
                Some(project.id)
            }
            None => None,
        };

        let mut task_status_iter = task_statuses.into_iter();
        for (entry, feature_status) in spec.features.iter().zip(feature_statuses) {
            let mut feature = entry.feature.clone();
            if feature.project_id.is_none() {
                feature.project_id = project_id;
            }
            let feature = Self::insert_feature(&mut tx, &feature, &feature_status).await?;
            created.feature_ids.push(feature.id);

            let mut local_task_ids = Vec::with_capacity(entry.tasks.len());
            for task in &entry.tasks {
                let mut task = task.clone();
                task.feature_id = Some(feature.id);
                let status = task_status_iter
                    .next()
                    .ok_or_else(|| OrchestratorError::Internal("task status underrun".into()))?;
                let task = Self::insert_task(&mut tx, &task, &status).await?;
                local_task_ids.push(task.id);
                created.task_ids.push(task.id);
            }

            for edge in &entry.dependencies {
                let from = *local_task_ids.get(edge.from_index).ok_or_else(|| {
                    OrchestratorError::validation("dependency from_index out of range")
                })?;
                let to = *local_task_ids.get(edge.to_index).ok_or_else(|| {
                    OrchestratorError::validation("dependency to_index out of range")
                })?;
                let dep = Self::insert_dependency(
                    &mut tx,
                    &NewDependency {
                        from_task: from,
                        to_task: to,
                        dep_type: edge.dep_type,
                        unblock_at: edge.unblock_at,
                    },
                )
                .await?;
                created.dependency_ids.push(dep.id);
            }
        }

        tx.commit().await.map_err(sqlx_error_to_store_error)?;
        Ok(created)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for (table, slot) in [
            ("projects", &mut stats.total_projects),
            ("features", &mut stats.total_features),
            ("tasks", &mut stats.total_tasks),
            ("dependencies", &mut stats.total_dependencies),
        ] {
            let sql = format!("SELECT COUNT(*) AS n FROM {table}");
            let row = sqlx::query(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(sqlx_error_to_store_error)?;
            *slot = row.get::<i64, _>("n") as u64;
        }
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_store_error)?;
        for row in rows {
            stats
                .tasks_by_status
                .insert(row.get("status"), row.get::<i64, _>("n") as u64);
        }
        Ok(stats)
    }
}
