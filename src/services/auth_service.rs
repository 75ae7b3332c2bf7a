use crate::{
    config::{Config, JwtSettings},
    models::{Role, User, UserInfo},
    store::MarketStore,
    utils::{AppError, AppResult},
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user id (hex)
    pub email: String,
    pub role: Role,
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

impl Claims {
    pub fn user_id(&self) -> AppResult<ObjectId> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))
    }

    /// Returns the caller's id when their role is one of `allowed`
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<ObjectId> {
        if !allowed.contains(&self.role) {
            let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
            return Err(AppError::Forbidden(format!(
                "This action requires role: {}",
                names.join(" or ")
            )));
        }
        self.user_id()
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserInfo,
}

// Generate JWT token
pub fn generate_jwt(user: &User, jwt: &JwtSettings) -> AppResult<String> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::Internal("cannot issue token for unsaved user".into()))?;
    let now = Utc::now();

    let claims = Claims {
        sub: user_id.to_hex(),
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(jwt.ttl_hours)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: jwt.audience.clone(),
        iss: jwt.issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(token: &str, jwt: &JwtSettings) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[jwt.audience.as_str()]);

    let mut issuers = HashSet::new();
    issuers.insert(jwt.issuer.clone());
    validation.iss = Some(issuers);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

fn validate_registration(request: &RegisterRequest) -> AppResult<()> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Name is required".into()));
    }
    let email = request.email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(AppError::InvalidRequest("A valid email is required".into()));
    }
    if request.password.len() < 8 {
        return Err(AppError::InvalidRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

// User registration
pub async fn register(
    store: &dyn MarketStore,
    config: &Config,
    request: &RegisterRequest,
) -> AppResult<AuthResponse> {
    validate_registration(request)?;

    let password_hash = hash(&request.password, config.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    let now = Utc::now().timestamp();

    let user = User {
        id: None,
        name: request.name.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        password_hash,
        role: request.role,
        phone: request.phone.clone(),
        location: request.location.clone(),
        attributes: request.attributes.clone(),
        created_at: now,
        updated_at: now,
    };

    let user = store.insert_user(user).await?;
    let token = generate_jwt(&user, &config.jwt)?;

    Ok(AuthResponse {
        success: true,
        token,
        user: UserInfo::from(user),
    })
}

// User login
pub async fn login(
    store: &dyn MarketStore,
    config: &Config,
    request: &LoginRequest,
) -> AppResult<AuthResponse> {
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let user = store
        .find_user_by_email(&request.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    let valid = verify(&request.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))?;
    if !valid {
        return Err(invalid());
    }

    let token = generate_jwt(&user, &config.jwt)?;

    Ok(AuthResponse {
        success: true,
        token,
        user: UserInfo::from(user),
    })
}

pub async fn get_current_user(store: &dyn MarketStore, claims: &Claims) -> AppResult<UserInfo> {
    let user_id = claims.user_id()?;
    store
        .find_user(&user_id)
        .await?
        .map(UserInfo::from)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::store::MemoryStore;

    fn register_request(email: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            name: "Ravi Patil".into(),
            email: email.into(),
            password: "cane-password".into(),
            role,
            phone: None,
            location: Some("Sangli".into()),
            attributes: HashMap::from([("farmSizeAcres".to_string(), "12".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryStore::new();
        let config = test_config();

        let registered = register(&store, &config, &register_request("Ravi@Example.com", Role::Farmer))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "ravi@example.com");
        assert_eq!(registered.user.role, Role::Farmer);

        let login_request = LoginRequest {
            email: "ravi@example.com".into(),
            password: "cane-password".into(),
        };
        let logged_in = login(&store, &config, &login_request).await.unwrap();
        let claims = verify_token(&logged_in.token, &config.jwt).unwrap();
        assert_eq!(claims.sub, registered.user.id);
        assert_eq!(claims.role, Role::Farmer);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let store = MemoryStore::new();
        let config = test_config();
        register(&store, &config, &register_request("a@b.com", Role::Worker))
            .await
            .unwrap();

        let result = login(
            &store,
            &config,
            &LoginRequest { email: "a@b.com".into(), password: "nope-nope".into() },
        )
        .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        let config = test_config();
        register(&store, &config, &register_request("dup@b.com", Role::Factory))
            .await
            .unwrap();
        let again = register(&store, &config, &register_request("dup@b.com", Role::Hhm)).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let store = MemoryStore::new();
        let mut request = register_request("short@b.com", Role::Farmer);
        request.password = "123".into();
        let result = register(&store, &test_config(), &request).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_token_from_other_issuer_is_rejected() {
        let mut config = test_config();
        let user = User {
            id: Some(ObjectId::new()),
            name: "x".into(),
            email: "x@y.z".into(),
            password_hash: String::new(),
            role: Role::Hhm,
            phone: None,
            location: None,
            attributes: HashMap::new(),
            created_at: 0,
            updated_at: 0,
        };
        let token = generate_jwt(&user, &config.jwt).unwrap();
        config.jwt.issuer = "someone-else".into();
        assert!(verify_token(&token, &config.jwt).is_err());
    }

    #[test]
    fn test_require_role() {
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            email: "w@x.y".into(),
            role: Role::Worker,
            iat: 0,
            exp: 0,
            jti: String::new(),
            aud: String::new(),
            iss: String::new(),
        };
        assert!(claims.require_role(&[Role::Worker]).is_ok());
        assert!(matches!(
            claims.require_role(&[Role::Farmer]),
            Err(AppError::Forbidden(_))
        ));
    }
}
