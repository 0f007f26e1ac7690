//! Route paths.

pub const GET_HEALTH: &str = "/api/v1/health";

pub const POST_REGISTER: &str = "/api/v1/register";
pub const POST_LOGIN: &str = "/api/v1/login";
pub const POST_LOGOUT: &str = "/api/v1/logout";
pub const POST_REFRESH: &str = "/api/v1/refresh";
pub const POST_VERIFY_EMAIL: &str = "/api/v1/verify-email";
pub const POST_RESEND_CODE: &str = "/api/v1/resend-code";

pub const GET_ME: &str = "/api/v1/me";
pub const GET_ME_COMPANY: &str = "/api/v1/me/companies/{company_id}";

pub const USERS_ID: &str = "/api/v1/users/{id}";
pub const PUT_USERS_ID_PASSWORD: &str = "/api/v1/users/{id}/password";

pub const COMPANY_USERS: &str = "/api/v1/companies/{company_id}/users";
pub const COMPANY_USERS_ID: &str = "/api/v1/companies/{company_id}/users/{user_id}";

/// Paths served without a bearer token.
pub const PUBLIC_ROUTES: &[&str] = &[
    GET_HEALTH,
    POST_REGISTER,
    POST_LOGIN,
    POST_LOGOUT,
    POST_REFRESH,
    POST_VERIFY_EMAIL,
    POST_RESEND_CODE,
];
