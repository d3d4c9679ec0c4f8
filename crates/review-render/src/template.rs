// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-pass placeholder expansion over a known placeholder set
//! (`spec.md` §4.4), replacing regex-based HTML templating.

use review_core::RenderRequest;
use review_error::ReviewError;
use std::collections::BTreeMap;

/// The built-in template used when a request does not name one.
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

const DEFAULT_TEMPLATE_HTML: &str = r#"<!doctype html>
<html>
<head>
<style>
  body { background: {{BRAND_COLOR}}; }
  .card { border-color: {{BRAND_COLOR_DARK}}; }
  .tech { display: {{TECH_DISPLAY}}; }
</style>
</head>
<body class="{{LOW_RATING_CLASS}}">
  <div class="card">
    <img class="logo" src="{{LOGO_URL}}" alt="{{COMPANY_NAME}}">
    <div class="company">{{COMPANY_NAME}} &middot; {{COMPANY_PHONE}}</div>
    {{PLATFORM_BADGE}}
    <div class="stars">{{STARS}}</div>
    <div class="reviewer">{{REVIEWER_NAME}}</div>
    <blockquote class="review-text">{{REVIEW_TEXT}}</blockquote>
    <div class="tech">
      <img src="{{TECH_PHOTO_URL}}" alt="{{TECH_NAME}}">
      <span>{{TECH_NAME}}</span>
    </div>
  </div>
</body>
</html>
"#;

/// Filled-star glyph repeated once per rating point.
const STAR_GLYPH: char = '\u{2605}';

/// Company branding fields a template may reference; kept separate from
/// [`review_core::config::CompanyConfig`] so this crate doesn't need to
/// know about the full configuration document.
#[derive(Debug, Clone)]
pub struct Branding {
    /// Company display name.
    pub company_name: String,
    /// Company phone number.
    pub company_phone: String,
    /// Default logo URL, overridden per-request if `logo_url` is set.
    pub logo_url: String,
    /// Default brand colour, overridden per-request if `brand_color` is set.
    pub brand_color: String,
    /// Default dark brand colour, overridden per-request if
    /// `brand_color_dark` is set.
    pub brand_color_dark: String,
}

/// A precomputed platform badge snippet, keyed by platform tag.
#[derive(Debug, Clone, Default)]
pub struct PlatformBadges(BTreeMap<String, String>);

impl PlatformBadges {
    /// The default badge set: a handful of well-known review platforms.
    pub fn defaults() -> Self {
        let mut badges = BTreeMap::new();
        badges.insert(
            "google".to_string(),
            r#"<span class="badge badge-google">Google</span>"#.to_string(),
        );
        badges.insert(
            "yelp".to_string(),
            r#"<span class="badge badge-yelp">Yelp</span>"#.to_string(),
        );
        badges.insert(
            "facebook".to_string(),
            r#"<span class="badge badge-facebook">Facebook</span>"#.to_string(),
        );
        Self(badges)
    }

    /// The snippet for `platform`, or an empty string if unrecognised.
    pub fn badge_for(&self, platform: Option<&str>) -> String {
        platform
            .and_then(|p| self.0.get(p))
            .cloned()
            .unwrap_or_default()
    }
}

/// Loads named templates; only `"default"` is built in.
pub struct TemplateRegistry {
    templates: BTreeMap<String, String>,
}

impl TemplateRegistry {
    /// A registry containing only the built-in default template.
    pub fn with_defaults() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(DEFAULT_TEMPLATE_NAME.to_string(), DEFAULT_TEMPLATE_HTML.to_string());
        Self { templates }
    }

    /// Names of all registered templates, for `/api/templates`.
    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    fn text(&self, name: &str) -> Result<&str, ReviewError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ReviewError::bad_request("unknown template").with_context("template", name))
    }

    /// Expand `name` against `request`, `branding`, platform badges, and a
    /// base URL for resolving relative asset URLs.
    pub fn render(
        &self,
        name: &str,
        request: &RenderRequest,
        branding: &Branding,
        badges: &PlatformBadges,
        base_url: &str,
    ) -> Result<String, ReviewError> {
        let text = self.text(name)?;
        Ok(expand(text, request, branding, badges, base_url))
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn resolve_url(base_url: &str, url: &str) -> String {
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), url.trim_start_matches('/'))
}

fn expand(
    template: &str,
    request: &RenderRequest,
    branding: &Branding,
    badges: &PlatformBadges,
    base_url: &str,
) -> String {
    let stars = request.clamped_stars();
    let low_rating_class = if stars <= 3 { "low-rating" } else { "" };

    let logo_url = request.logo_url.as_deref().unwrap_or(&branding.logo_url);
    let brand_color = request.brand_color.as_deref().unwrap_or(&branding.brand_color);
    let brand_color_dark = request
        .brand_color_dark
        .as_deref()
        .unwrap_or(&branding.brand_color_dark);
    let tech_photo_url = request.tech_photo_url.as_deref().unwrap_or("");
    let tech_name = request.tech_name.as_deref().unwrap_or("");
    let tech_display = if !tech_photo_url.is_empty() && !tech_name.is_empty() {
        "flex"
    } else {
        "none"
    };
    let platform_badge = badges.badge_for(request.source.as_deref());

    template
        .replace("{{BRAND_COLOR}}", &escape_html(brand_color))
        .replace("{{BRAND_COLOR_DARK}}", &escape_html(brand_color_dark))
        .replace("{{COMPANY_NAME}}", &branding.company_name)
        .replace("{{COMPANY_PHONE}}", &branding.company_phone)
        .replace("{{LOGO_URL}}", &escape_html(&resolve_url(base_url, logo_url)))
        .replace("{{REVIEWER_NAME}}", &escape_html(&request.reviewer_name))
        .replace("{{REVIEW_TEXT}}", &escape_html(&request.review_text))
        .replace("{{STARS}}", &STAR_GLYPH.to_string().repeat(stars as usize))
        .replace(
            "{{TECH_PHOTO_URL}}",
            &escape_html(&resolve_url(base_url, tech_photo_url)),
        )
        .replace("{{TECH_NAME}}", &escape_html(tech_name))
        .replace("{{TECH_DISPLAY}}", tech_display)
        .replace("{{LOW_RATING_CLASS}}", low_rating_class)
        .replace("{{PLATFORM_BADGE}}", &platform_badge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_core::{OutputFormat, SizePreset};

    fn branding() -> Branding {
        Branding {
            company_name: "Acme HVAC".into(),
            company_phone: "555-0100".into(),
            logo_url: "/logo.png".into(),
            brand_color: "#1a73e8".into(),
            brand_color_dark: "#0b4fa0".into(),
        }
    }

    fn request() -> RenderRequest {
        RenderRequest {
            reviewer_name: "Jane <3".into(),
            rating: 2,
            review_text: "A&B \"great\"".into(),
            tech_name: Some("Alex".into()),
            tech_photo_url: Some("/alex.png".into()),
            source: Some("google".into()),
            template: DEFAULT_TEMPLATE_NAME.into(),
            size: SizePreset::Square,
            format: OutputFormat::Png,
            brand_color: None,
            brand_color_dark: None,
            logo_url: None,
            callback_url: None,
        }
    }

    #[test]
    fn unknown_template_is_bad_request() {
        let registry = TemplateRegistry::with_defaults();
        let err = registry
            .render("nope", &request(), &branding(), &PlatformBadges::defaults(), "https://example.com")
            .unwrap_err();
        assert_eq!(err.kind, review_error::ErrorKind::BadRequest);
    }

    #[test]
    fn escapes_user_supplied_text() {
        let registry = TemplateRegistry::with_defaults();
        let html = registry
            .render(
                DEFAULT_TEMPLATE_NAME,
                &request(),
                &branding(),
                &PlatformBadges::defaults(),
                "https://example.com",
            )
            .unwrap();
        assert!(html.contains("Jane &lt;3"));
        assert!(html.contains("A&amp;B &quot;great&quot;"));
    }

    #[test]
    fn low_rating_class_applied_at_or_below_three() {
        let registry = TemplateRegistry::with_defaults();
        let html = registry
            .render(
                DEFAULT_TEMPLATE_NAME,
                &request(),
                &branding(),
                &PlatformBadges::defaults(),
                "https://example.com",
            )
            .unwrap();
        assert!(html.contains(r#"class="low-rating""#));
    }

    #[test]
    fn stars_repeated_to_clamped_rating() {
        let mut req = request();
        req.rating = 5;
        let registry = TemplateRegistry::with_defaults();
        let html = registry
            .render(DEFAULT_TEMPLATE_NAME, &req, &branding(), &PlatformBadges::defaults(), "https://example.com")
            .unwrap();
        assert_eq!(html.matches(STAR_GLYPH).count(), 5);
    }

    #[test]
    fn tech_display_is_flex_only_when_both_present() {
        let registry = TemplateRegistry::with_defaults();
        let mut req = request();
        req.tech_name = None;
        let html = registry
            .render(DEFAULT_TEMPLATE_NAME, &req, &branding(), &PlatformBadges::defaults(), "https://example.com")
            .unwrap();
        assert!(html.contains("display: none"));
    }

    #[test]
    fn relative_logo_resolved_against_base_url() {
        let registry = TemplateRegistry::with_defaults();
        let html = registry
            .render(
                DEFAULT_TEMPLATE_NAME,
                &request(),
                &branding(),
                &PlatformBadges::defaults(),
                "https://example.com",
            )
            .unwrap();
        assert!(html.contains(r#"src="https://example.com/logo.png""#));
    }

    #[test]
    fn platform_badge_empty_for_unknown_source() {
        let registry = TemplateRegistry::with_defaults();
        let mut req = request();
        req.source = Some("unknown-platform".into());
        let html = registry
            .render(DEFAULT_TEMPLATE_NAME, &req, &branding(), &PlatformBadges::defaults(), "https://example.com")
            .unwrap();
        assert!(!html.contains("badge-"));
    }
}
