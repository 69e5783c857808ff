//! SQLite storage backend
//!
//! Implements every repository contract against the schema created by
//! `bizlink_common::db::create_schema`. Id-list lookups are always batched
//! into a single `IN (...)` query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use super::{
    CandidateFilter, ContentFilter, ContentRepository, EngagementCounts, SocialRepository,
    TaxonomyRepository, UserRepository,
};
use crate::model::{
    AudienceTags, Classification, ConnectionStatus, ContentItem, ContentKind, FeedSettings,
    KindDetails, TagRef, TaxonomyLevel, TaxonomySet, UserProfile,
};
use crate::taxonomy::{
    CategoryNode, IdentityCatalog, IdentityNode, Membership, SubcategoryNode, SubsubNode,
};
use bizlink_common::Result;

/// Repository backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Append `column IN (?, ?, ...)` binding every id
fn push_in_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, column: &str, ids: impl IntoIterator<Item = String>) {
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

/// Substring pattern for `LIKE` with a backslash escape; wildcards in `value` match literally
fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const LIKE_ESCAPE: &str = " ESCAPE '\\'";

fn item_from_row(row: &SqliteRow) -> Result<ContentItem> {
    let kind_str: String = row.try_get("kind")?;
    let kind: ContentKind = kind_str.parse()?;
    let details_raw: String = row.try_get("details")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(ContentItem {
        id: row.try_get("id")?,
        kind,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        created_at,
        owner_id: row.try_get("owner_id")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        audience: AudienceTags::default(),
        classification: Classification {
            category_id: row.try_get("category_id")?,
            subcategory_id: row.try_get("subcategory_id")?,
            subsubcategory_id: row.try_get("subsubcategory_id")?,
            industry_category_id: row.try_get("industry_category_id")?,
        },
        details: KindDetails::from_json(kind, &details_raw)?,
    })
}

/// JSON path of a kind-specific text field, compared case-insensitively
fn push_details_eq<'a>(qb: &mut QueryBuilder<'a, Sqlite>, path: &str, value: &Option<String>) {
    if let Some(value) = value {
        qb.push(format!(" AND LOWER(json_extract(details, '{}')) = ", path));
        qb.push_bind(value.to_lowercase());
    }
}

#[async_trait]
impl ContentRepository for SqliteStore {
    async fn find_by_audience_and_filters(
        &self,
        kind: ContentKind,
        filter: &ContentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, kind, title, description, owner_id, city, country, category_id, \
             subcategory_id, subsubcategory_id, industry_category_id, details, created_at \
             FROM content_items WHERE kind = ",
        );
        qb.push_bind(kind.as_str());

        let terms = filter.terms();
        if !terms.is_empty() {
            qb.push(" AND (");
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("LOWER(title) LIKE ");
                qb.push_bind(like_pattern(term));
                qb.push(LIKE_ESCAPE);
                qb.push(" OR LOWER(description) LIKE ");
                qb.push_bind(like_pattern(term));
                qb.push(LIKE_ESCAPE);
            }
            qb.push(")");
        }

        if let Some(country) = &filter.country {
            qb.push(" AND LOWER(country) = ");
            qb.push_bind(country.to_lowercase());
        }
        if let Some(city) = &filter.city {
            qb.push(" AND LOWER(city) LIKE ");
            qb.push_bind(like_pattern(city));
            qb.push(LIKE_ESCAPE);
        }
        if let Some(owner_id) = &filter.owner_id {
            qb.push(" AND owner_id = ");
            qb.push_bind(owner_id.clone());
        }
        if let Some(owner_ids) = &filter.owner_ids {
            if owner_ids.is_empty() {
                qb.push(" AND 0");
            } else {
                qb.push(" AND ");
                push_in_list(&mut qb, "owner_id", owner_ids.iter().cloned());
            }
        }

        let classification = [
            ("category_id", &filter.general.category_ids),
            ("subcategory_id", &filter.general.subcategory_ids),
            ("subsubcategory_id", &filter.general.subsub_ids),
            ("industry_category_id", &filter.industry_ids),
        ];
        for (column, ids) in classification {
            if !ids.is_empty() {
                qb.push(" AND ");
                push_in_list(&mut qb, column, ids.iter().cloned());
            }
        }

        let k = &filter.kind_filters;
        match kind {
            ContentKind::Job => {
                push_details_eq(&mut qb, "$.experienceLevel", &k.experience_level);
                push_details_eq(&mut qb, "$.jobType", &k.job_type);
            }
            ContentKind::Event => push_details_eq(&mut qb, "$.eventType", &k.event_type),
            ContentKind::Service => push_details_eq(&mut qb, "$.serviceType", &k.service_type),
            ContentKind::Tourism => push_details_eq(&mut qb, "$.postType", &k.post_type),
            _ => {}
        }
        if matches!(kind, ContentKind::Product | ContentKind::Service | ContentKind::Event) {
            if let Some(min) = k.price_min {
                qb.push(" AND (json_extract(details, '$.price') IS NULL OR json_extract(details, '$.price') >= ");
                qb.push_bind(min);
                qb.push(")");
            }
            if let Some(max) = k.price_max {
                qb.push(" AND (json_extract(details, '$.price') IS NULL OR json_extract(details, '$.price') <= ");
                qb.push_bind(max);
                qb.push(")");
            }
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(item_from_row).collect::<Result<Vec<_>>>()?;

        debug!(kind = %kind, fetched = items.len(), limit, "Fetched content page");
        Ok(items)
    }

    async fn load_audience(&self, item_ids: &[String]) -> Result<HashMap<String, AudienceTags>> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT ca.item_id, ca.level, ca.taxonomy_id,
                   COALESCE(CASE ca.level
                       WHEN 'identity' THEN (SELECT name FROM identities WHERE id = ca.taxonomy_id)
                       WHEN 'category' THEN (SELECT name FROM categories WHERE id = ca.taxonomy_id)
                       WHEN 'subcategory' THEN (SELECT name FROM subcategories WHERE id = ca.taxonomy_id)
                       WHEN 'subsubcategory' THEN (SELECT name FROM subsubcategories WHERE id = ca.taxonomy_id)
                   END, '') AS name
            FROM content_audience ca
            WHERE "#,
        );
        push_in_list(&mut qb, "ca.item_id", item_ids.iter().cloned());
        qb.push(" ORDER BY ca.item_id, ca.level, ca.taxonomy_id");

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut audiences: HashMap<String, AudienceTags> = HashMap::new();
        for row in rows {
            let item_id: String = row.try_get("item_id")?;
            let level: String = row.try_get("level")?;
            let Some(level) = TaxonomyLevel::parse(&level) else {
                continue;
            };
            audiences
                .entry(item_id)
                .or_default()
                .tags_mut(level)
                .push(TagRef::new(
                    row.try_get::<String, _>("taxonomy_id")?,
                    row.try_get::<String, _>("name")?,
                ));
        }
        Ok(audiences)
    }

    async fn item_owner(&self, kind: ContentKind, item_id: &str) -> Result<Option<String>> {
        let owner = sqlx::query_scalar("SELECT owner_id FROM content_items WHERE id = ? AND kind = ?")
            .bind(item_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn replace_audience(&self, item_id: &str, audience: &TaxonomySet) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_audience WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        for level in TaxonomyLevel::ALL {
            for taxonomy_id in audience.ids(level) {
                sqlx::query(
                    "INSERT INTO content_audience (item_id, level, taxonomy_id) VALUES (?, ?, ?)",
                )
                .bind(item_id)
                .bind(level.as_str())
                .bind(taxonomy_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(item_id = %item_id, "Replaced audience associations");
        Ok(())
    }
}

#[async_trait]
impl TaxonomyRepository for SqliteStore {
    async fn find_categories(&self, ids: &[String]) -> Result<Vec<CategoryNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, name FROM categories WHERE ");
        push_in_list(&mut qb, "id", ids.iter().cloned());
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(CategoryNode {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn find_subcategories(&self, ids: &[String]) -> Result<Vec<SubcategoryNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, category_id FROM subcategories WHERE ");
        push_in_list(&mut qb, "id", ids.iter().cloned());
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(SubcategoryNode {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    category_id: row.try_get("category_id")?,
                })
            })
            .collect()
    }

    async fn find_subsubcategories(&self, ids: &[String]) -> Result<Vec<SubsubNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, subcategory_id FROM subsubcategories WHERE ");
        push_in_list(&mut qb, "id", ids.iter().cloned());
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(SubsubNode {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    subcategory_id: row.try_get("subcategory_id")?,
                })
            })
            .collect()
    }

    async fn load_catalog(&self) -> Result<IdentityCatalog> {
        let identities = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM identities")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, name)| IdentityNode { id, name })
            .collect();

        let categories = sqlx::query_as::<_, (String, String)>("SELECT id, name FROM categories")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, name)| CategoryNode { id, name })
            .collect();

        let subcategories =
            sqlx::query_as::<_, (String, String, String)>("SELECT id, name, category_id FROM subcategories")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|(id, name, category_id)| SubcategoryNode { id, name, category_id })
                .collect();

        let subsubs = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, name, subcategory_id FROM subsubcategories",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, name, subcategory_id)| SubsubNode { id, name, subcategory_id })
        .collect();

        let memberships = sqlx::query_as::<_, (String, String, String)>(
            "SELECT identity_id, level, node_id FROM identity_members",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .filter_map(|(identity_id, level, node_id)| {
            TaxonomyLevel::parse(&level).map(|level| Membership {
                identity_id,
                level,
                node_id,
            })
        })
        .collect();

        Ok(IdentityCatalog::new(identities, categories, subcategories, subsubs, memberships))
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile> {
    let content_types: String = row.try_get("content_types")?;
    let content_types: BTreeSet<ContentKind> = content_types
        .split(',')
        .filter_map(|kind| kind.trim().parse().ok())
        .collect();
    let connections_only: i64 = row.try_get("connections_only")?;

    Ok(UserProfile {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        headline: row.try_get("headline")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        offerings: TaxonomySet::default(),
        interests: TaxonomySet::default(),
        settings: FeedSettings {
            connections_only: connections_only != 0,
            content_types,
        },
    })
}

impl SqliteStore {
    /// Fill offerings and interests for many profiles in one query
    async fn attach_taxonomy(&self, profiles: &mut [UserProfile]) -> Result<()> {
        if profiles.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT user_id, facet, level, taxonomy_id FROM user_taxonomy WHERE ");
        push_in_list(&mut qb, "user_id", profiles.iter().map(|p| p.id.clone()));
        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut by_user: HashMap<String, (TaxonomySet, TaxonomySet)> = HashMap::new();
        for row in rows {
            let user_id: String = row.try_get("user_id")?;
            let facet: String = row.try_get("facet")?;
            let level: String = row.try_get("level")?;
            let taxonomy_id: String = row.try_get("taxonomy_id")?;
            let Some(level) = TaxonomyLevel::parse(&level) else {
                continue;
            };
            let entry = by_user.entry(user_id).or_default();
            let set = match facet.as_str() {
                "offering" => &mut entry.0,
                "interest" => &mut entry.1,
                _ => continue,
            };
            set.ids_mut(level).insert(taxonomy_id);
        }

        for profile in profiles.iter_mut() {
            if let Some((offerings, interests)) = by_user.remove(&profile.id) {
                profile.offerings = offerings;
                profile.interests = interests;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT id, name, headline, city, country, connections_only, content_types FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut profiles = vec![profile_from_row(&row)?];
        self.attach_taxonomy(&mut profiles).await?;
        Ok(profiles.pop())
    }

    async fn find_candidates(&self, filter: &CandidateFilter, limit: usize) -> Result<Vec<UserProfile>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, name, headline, city, country, connections_only, content_types FROM users WHERE 1 = 1",
        );

        if let Some(exclude) = &filter.exclude_user_id {
            qb.push(" AND id != ");
            qb.push_bind(exclude.clone());
        }
        if let Some(q) = &filter.q {
            qb.push(" AND (LOWER(name) LIKE ");
            qb.push_bind(like_pattern(q));
            qb.push(LIKE_ESCAPE);
            qb.push(" OR LOWER(COALESCE(headline, '')) LIKE ");
            qb.push_bind(like_pattern(q));
            qb.push(LIKE_ESCAPE);
            qb.push(")");
        }
        if let Some(country) = &filter.country {
            qb.push(" AND LOWER(country) = ");
            qb.push_bind(country.to_lowercase());
        }
        if let Some(city) = &filter.city {
            qb.push(" AND LOWER(city) LIKE ");
            qb.push_bind(like_pattern(city));
            qb.push(LIKE_ESCAPE);
        }
        for (level, ids) in [
            (TaxonomyLevel::Category, &filter.category_ids),
            (TaxonomyLevel::Subcategory, &filter.subcategory_ids),
        ] {
            if ids.is_empty() {
                continue;
            }
            qb.push(" AND id IN (SELECT user_id FROM user_taxonomy WHERE facet = 'offering' AND level = ");
            qb.push_bind(level.as_str());
            qb.push(" AND ");
            push_in_list(&mut qb, "taxonomy_id", ids.iter().cloned());
            qb.push(")");
        }

        qb.push(" ORDER BY name ASC, id ASC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut profiles = rows.iter().map(profile_from_row).collect::<Result<Vec<_>>>()?;
        self.attach_taxonomy(&mut profiles).await?;
        Ok(profiles)
    }
}

#[async_trait]
impl SocialRepository for SqliteStore {
    async fn connection_status_map(
        &self,
        viewer_id: &str,
        target_ids: &[String],
    ) -> Result<HashMap<String, ConnectionStatus>> {
        let mut statuses: HashMap<String, ConnectionStatus> = target_ids
            .iter()
            .map(|id| (id.clone(), ConnectionStatus::None))
            .collect();
        if target_ids.is_empty() {
            return Ok(statuses);
        }

        // pending first so an accepted connection overrides a stale request
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT from_user_id, to_user_id FROM connection_requests WHERE status = 'pending' AND ((from_user_id = ",
        );
        qb.push_bind(viewer_id.to_string());
        qb.push(" AND ");
        push_in_list(&mut qb, "to_user_id", target_ids.iter().cloned());
        qb.push(") OR (to_user_id = ");
        qb.push_bind(viewer_id.to_string());
        qb.push(" AND ");
        push_in_list(&mut qb, "from_user_id", target_ids.iter().cloned());
        qb.push("))");
        for row in qb.build().fetch_all(&self.pool).await? {
            let from: String = row.try_get("from_user_id")?;
            let to: String = row.try_get("to_user_id")?;
            if from == viewer_id {
                statuses.insert(to, ConnectionStatus::PendingOutgoing);
            } else {
                statuses.insert(from, ConnectionStatus::PendingIncoming);
            }
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT peer_id FROM connections WHERE user_id = ");
        qb.push_bind(viewer_id.to_string());
        qb.push(" AND ");
        push_in_list(&mut qb, "peer_id", target_ids.iter().cloned());
        for row in qb.build().fetch_all(&self.pool).await? {
            statuses.insert(row.try_get("peer_id")?, ConnectionStatus::Connected);
        }

        Ok(statuses)
    }

    async fn connected_user_ids(&self, viewer_id: &str) -> Result<BTreeSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT peer_id FROM connections WHERE user_id = ?")
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn engagement_counts(&self, item_ids: &[String]) -> Result<HashMap<String, EngagementCounts>> {
        let mut counts: HashMap<String, EngagementCounts> = item_ids
            .iter()
            .map(|id| (id.clone(), EngagementCounts::default()))
            .collect();
        if item_ids.is_empty() {
            return Ok(counts);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT item_id, COUNT(*) AS n FROM likes WHERE ");
        push_in_list(&mut qb, "item_id", item_ids.iter().cloned());
        qb.push(" GROUP BY item_id");
        for row in qb.build().fetch_all(&self.pool).await? {
            let item_id: String = row.try_get("item_id")?;
            let n: i64 = row.try_get("n")?;
            counts.entry(item_id).or_default().likes = n.max(0) as u64;
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT item_id, COUNT(*) AS n FROM comments WHERE ");
        push_in_list(&mut qb, "item_id", item_ids.iter().cloned());
        qb.push(" GROUP BY item_id");
        for row in qb.build().fetch_all(&self.pool).await? {
            let item_id: String = row.try_get("item_id")?;
            let n: i64 = row.try_get("n")?;
            counts.entry(item_id).or_default().comments = n.max(0) as u64;
        }

        Ok(counts)
    }

    async fn liked_item_ids(&self, viewer_id: &str, item_ids: &[String]) -> Result<HashSet<String>> {
        if item_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT item_id FROM likes WHERE user_id = ");
        qb.push_bind(viewer_id.to_string());
        qb.push(" AND ");
        push_in_list(&mut qb, "item_id", item_ids.iter().cloned());
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok(row.try_get::<String, _>("item_id")?))
            .collect()
    }

    async fn application_statuses(
        &self,
        viewer_id: &str,
        job_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        self.status_lookup("job_applications", "job_id", viewer_id, job_ids).await
    }

    async fn registration_statuses(
        &self,
        viewer_id: &str,
        event_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        self.status_lookup("event_registrations", "event_id", viewer_id, event_ids).await
    }
}

impl SqliteStore {
    async fn status_lookup(
        &self,
        table: &str,
        id_column: &str,
        viewer_id: &str,
        ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {id_column} AS target_id, status FROM {table} WHERE user_id = "
        ));
        qb.push_bind(viewer_id.to_string());
        qb.push(" AND ");
        push_in_list(&mut qb, id_column, ids.iter().cloned());
        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| Ok((row.try_get("target_id")?, row.try_get("status")?)))
            .collect()
    }
}
