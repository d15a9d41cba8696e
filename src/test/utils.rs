#[cfg(test)]
pub mod test_utils {
    use crate::auth::{Role, UserSession};
    use crate::catalog::Catalog;
    use crate::database::ensure_schema;
    use crate::db::{create_client, create_event, create_order, create_user};
    use crate::error::AppError;
    use chrono::{NaiveDate, Utc};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        clients: Vec<TestClient>,
        events: Vec<TestEvent>,
        orders: Vec<TestOrder>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestClient {
        pub name: String,
        pub phone: String,
    }

    pub struct TestEvent {
        pub event_name: String,
        pub event_date: NaiveDate,
    }

    pub struct TestOrder {
        pub name: String,
        pub drink: String,
        pub quantity: i64,
        pub price_sum: f64,
        pub paid: bool,
        pub order_date: Option<NaiveDate>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn staff(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Staff,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn manager(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Manager,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn client(mut self, name: &str, phone: &str) -> Self {
            self.clients.push(TestClient {
                name: name.to_string(),
                phone: phone.to_string(),
            });
            self
        }

        pub fn event(mut self, event_name: &str, event_date: NaiveDate) -> Self {
            self.events.push(TestEvent {
                event_name: event_name.to_string(),
                event_date,
            });
            self
        }

        pub fn order(mut self, name: &str, drink: &str, quantity: i64, price_sum: f64) -> Self {
            self.orders.push(TestOrder {
                name: name.to_string(),
                drink: drink.to_string(),
                quantity,
                price_sum,
                paid: false,
                order_date: None,
            });
            self
        }

        pub fn paid_order(
            mut self,
            name: &str,
            drink: &str,
            quantity: i64,
            price_sum: f64,
        ) -> Self {
            self.orders.push(TestOrder {
                name: name.to_string(),
                drink: drink.to_string(),
                quantity,
                price_sum,
                paid: true,
                order_date: None,
            });
            self
        }

        pub fn order_on(
            mut self,
            name: &str,
            drink: &str,
            quantity: i64,
            price_sum: f64,
            order_date: NaiveDate,
        ) -> Self {
            self.orders.push(TestOrder {
                name: name.to_string(),
                drink: drink.to_string(),
                quantity,
                price_sum,
                paid: false,
                order_date: Some(order_date),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .with_test_writer()
                    .try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            ensure_schema(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut client_id_map: HashMap<String, i64> = HashMap::new();
            let mut order_ids: Vec<i64> = Vec::new();

            for user in &self.users {
                let user_id =
                    create_user(&pool, &user.username, &user.password, user.role.as_str()).await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            for client in &self.clients {
                let client_id = create_client(&pool, &client.name, &client.phone).await?;
                client_id_map.insert(client.name.clone(), client_id);
            }

            for event in &self.events {
                create_event(&pool, &event.event_name, event.event_date).await?;
            }

            for order in &self.orders {
                let (id, _) = create_order(
                    &pool,
                    &order.name,
                    &order.drink,
                    order.quantity,
                    order.price_sum,
                )
                .await?;

                if order.paid {
                    sqlx::query("UPDATE orders SET paid = TRUE, paid_date = ? WHERE id = ?")
                        .bind(Utc::now().date_naive())
                        .bind(id)
                        .execute(&pool)
                        .await?;
                }

                if let Some(order_date) = order.order_date {
                    sqlx::query("UPDATE orders SET order_date = ? WHERE id = ?")
                        .bind(order_date)
                        .bind(id)
                        .execute(&pool)
                        .await?;
                }

                order_ids.push(id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                client_id_map,
                order_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub client_id_map: HashMap<String, i64>,
        pub order_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn client_id(&self, name: &str) -> Option<i64> {
            self.client_id_map.get(name).copied()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .staff("staff_user")
            .manager("manager_user")
            .client("Dana", "050-1234567")
            .client("Avi", "052-7654321")
            .build()
            .await
            .expect("Failed to build test database")
    }

    /// Spins up a tracked local client over the full application, backed by
    /// the given test database and a throwaway catalog file.
    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let catalog_path = std::env::temp_dir().join(format!(
            "catalog-test-{}.json",
            UserSession::generate_token()
        ));
        let rocket = crate::init_rocket(test_db.pool.clone(), Catalog::new(catalog_path));

        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build test client");

        (client, test_db)
    }

    /// Logs `username` in with the standard fixture password; the tracked
    /// client carries the session cookie on every later request.
    pub async fn login_test_user(client: &Client, username: &str) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "Login failed for {}", username);
    }
}
