pub const STATUS_NEW: &str = "new";
pub const STATUS_IN_QUEUE: &str = "in_queue";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: i64,
    pub email_confirmed: i64,
    pub confirmation_code: Option<String>,
    pub confirmation_sent_at: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn is_admin(&self) -> bool {
        self.is_admin == 1
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub desired_date: String,
    pub desired_time: String,
    pub status: String,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueRow {
    pub id: String,
    pub application_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub desired_date: String,
    pub desired_time: String,
    pub status: String,
    pub comment: String,
    pub created_at: String,
    pub moved_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InServiceRow {
    pub id: String,
    pub queue_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub desired_date: String,
    pub desired_time: String,
    pub estimated_completion: Option<String>,
    pub estimated_cost: Option<f64>,
    pub work_list: String,
    pub attachment: Option<String>,
    pub comment: String,
    pub created_at: String,
    pub moved_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompletedServiceRow {
    pub id: String,
    pub queue_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub car_brand: String,
    pub car_model: String,
    pub desired_date: String,
    pub desired_time: String,
    pub estimated_completion: Option<String>,
    pub estimated_cost: Option<f64>,
    pub work_list: String,
    pub attachment: Option<String>,
    pub comment: String,
    pub created_at: String,
    pub moved_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscountRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_active: i64,
    pub expires_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServicePriceRow {
    pub id: String,
    pub service_name: String,
    pub description: String,
    pub price: f64,
    pub is_active: i64,
    pub created_at: String,
}
