use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

pub const USERS: &str = "users";
pub const LISTINGS: &str = "listings";
pub const ORDERS: &str = "orders";
pub const SCHEDULES: &str = "schedules";
pub const APPLICATIONS: &str = "applications";
pub const INVITATIONS: &str = "invitations";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        // Extract database name from URI or use default
        let db_name = uri
            .rsplit('/')
            .next()
            .and_then(|s| s.split('?').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("cane_market");

        let db = client.database(db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates necessary indexes for optimal query performance
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let indexes: Vec<(&str, Document, Option<IndexOptions>)> = vec![
            (USERS, doc! { "email": 1 }, Some(unique())),
            (LISTINGS, doc! { "farmer_id": 1, "created_at": -1 }, None),
            (LISTINGS, doc! { "status": 1, "crop_type": 1 }, None),
            (LISTINGS, doc! { "status": 1, "expires_at": 1 }, None),
            // Two query paths over one order document: seller view and buyer view
            (ORDERS, doc! { "seller_id": 1, "created_at": -1 }, None),
            (ORDERS, doc! { "buyer_id": 1, "created_at": -1 }, None),
            (SCHEDULES, doc! { "hhm_id": 1 }, None),
            (SCHEDULES, doc! { "status": 1, "created_at": -1 }, None),
            (APPLICATIONS, doc! { "schedule_id": 1, "worker_id": 1 }, Some(unique())),
            (APPLICATIONS, doc! { "worker_id": 1 }, None),
            (INVITATIONS, doc! { "worker_id": 1 }, None),
            (INVITATIONS, doc! { "hhm_id": 1 }, None),
        ];

        for (collection, keys, options) in indexes {
            let label = format!("{}({})", collection, keys.keys().cloned().collect::<Vec<_>>().join(", "));
            let model = IndexModel::builder().keys(keys).options(options).build();

            match self.collection::<Document>(collection).create_index(model).await {
                Ok(_) => log::info!("   ✅ Index created: {}", label),
                Err(e) => log::debug!("   ℹ️  Index already exists: {} ({})", label, e),
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn health_check(&self) -> Result<bool, mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/cane_market_test".to_string());

        let db = MongoDB::new(&uri).await.expect("connect");
        assert!(db.health_check().await.unwrap());
    }
}
