use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

/// Authentication happens upstream; the gateway forwards the verified user
/// id in this header and we only parse it.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug)]
pub struct GatewayUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for GatewayUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                format!("Missing {USER_ID_HEADER} header"),
            ))?;

        let user_id = raw.parse::<Uuid>().map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                format!("Invalid {USER_ID_HEADER} header"),
            )
        })?;

        Ok(GatewayUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<GatewayUser, (StatusCode, String)> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = header {
            builder = builder.header(USER_ID_HEADER, v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        GatewayUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_uuid_is_accepted() {
        let id = Uuid::new_v4();
        let user = extract(Some(&id.to_string())).await.expect("accepted");
        assert_eq!(user.0, id);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        assert_eq!(extract(None).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            extract(Some("not-a-uuid")).await.unwrap_err().0,
            StatusCode::UNAUTHORIZED
        );
    }
}
