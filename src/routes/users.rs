use axum::extract::State;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::user::User;
use crate::models::DataResponse;
use crate::state::AppState;

pub async fn get_current_user(
    state: State<AppState>,
    auth: AuthUser,
) -> Result<Json<DataResponse<User>>, AppError> {
    let user = db::users::get_user(&state.db, auth.user_id).await?;
    Ok(Json(DataResponse::new(user)))
}
