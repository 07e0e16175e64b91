use super::handlers::{
    auth::login,
    cms, health,
    submissions::{export, inbox, intake},
    uploads, users,
};
use utoipa::{
    Modify,
    openapi::{
        Contact, InfoBuilder, License, OpenApiBuilder, Tag,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Staff endpoints reference this scheme through `security(("bearer" = []))`.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` document. Handlers sharing a path go in
/// the same `routes!`.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(login::login))
        .routes(routes!(cms::get_entry, cms::upsert))
        .routes(routes!(cms::content))
        .routes(routes!(intake::create_form))
        .routes(routes!(inbox::list))
        .routes(routes!(export::export))
        .routes(routes!(inbox::detail, inbox::delete))
        .routes(routes!(inbox::update_status))
        .routes(routes!(inbox::accept))
        .routes(routes!(inbox::reject))
        .routes(routes!(inbox::reply))
        .routes(routes!(inbox::download))
        .routes(routes!(uploads::upload_file))
        .routes(routes!(users::list, users::create))
        .routes(routes!(users::update, users::delete))
        .routes(routes!(users::set_role))
        .routes(routes!(users::set_active));

    let tags = [
        ("health", "Liveness and database reachability"),
        ("auth", "Staff login"),
        ("cms", "CMS documents for the marketing sites"),
        ("submissions", "Public form intake"),
        ("inbox", "Staff inbox for submissions"),
        ("uploads", "Public asset uploads"),
        ("users", "Staff account management"),
    ];
    let openapi = router.get_openapi_mut();
    openapi.tags = Some(
        tags.into_iter()
            .map(|(name, description)| {
                let mut tag = Tag::new(name);
                tag.description = Some(description.to_string());
                tag
            })
            .collect(),
    );
    BearerAuth.modify(openapi);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, "purple");
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.description.as_deref(),
            Some("Marketing CMS and submissions inbox API")
        );

        let contact = doc.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Purple Publishing"));
        assert_eq!(contact.email.as_deref(), Some("dev@purplepublishing.com"));

        let license = doc.info.license.map(|license| license.name);
        assert_eq!(license.as_deref(), Some("BSD-3-Clause"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(parse_author("Ada <ada@purple.test>"), (Some("Ada"), Some("ada@purple.test")));
        assert_eq!(parse_author("<ada@purple.test>"), (None, Some("ada@purple.test")));
        assert_eq!(parse_author("Ada"), (Some("Ada"), None));
        assert_eq!(parse_author("  "), (None, None));
    }

    #[test]
    fn every_route_is_documented() {
        let doc = openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/cms",
            "/api/content/{full_key}",
            "/api/submissions",
            "/api/submissions/form",
            "/api/submissions/export",
            "/api/submissions/{id}",
            "/api/submissions/{id}/status",
            "/api/submissions/{id}/accept",
            "/api/submissions/{id}/reject",
            "/api/submissions/{id}/reply",
            "/api/submissions/{id}/files/{file_id}/download",
            "/api/uploads/file",
            "/api/users",
            "/api/users/{id}",
            "/api/users/{id}/role",
            "/api/users/{id}/active",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let tags = doc.tags.unwrap_or_default();
        for name in ["auth", "cms", "submissions", "inbox", "uploads", "users"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = openapi();
        let schemes = doc
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }
}
