//! SCIM 2.0 Protocol and Discovery Types
//!
//! Resources themselves are held as JSON objects (see
//! [`ResourceView`](super::evaluator::ResourceView)); this module defines the
//! schema URIs, resource metadata, list envelopes and the discovery documents
//! per RFC 7643/7644.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Schema URIs
// =============================================================================

/// SCIM Core User schema URI
pub const SCHEMA_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// SCIM Core Group schema URI
pub const SCHEMA_GROUP: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";

/// SCIM Enterprise User extension schema URI
pub const SCHEMA_ENTERPRISE_USER: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

/// Enterprise extension key sent by OneLogin in place of [`SCHEMA_ENTERPRISE_USER`]
pub const SCHEMA_ENTERPRISE_USER_ONELOGIN: &str = "urn:scim:schemas:extension:enterprise:2.0";

/// SCIM ListResponse schema URI
pub const SCHEMA_LIST_RESPONSE: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// SCIM Error schema URI
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// SCIM PatchOp schema URI
pub const SCHEMA_PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// SCIM ServiceProviderConfig schema URI
pub const SCHEMA_SERVICE_PROVIDER_CONFIG: &str =
    "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";

/// SCIM ResourceType schema URI
pub const SCHEMA_RESOURCE_TYPE: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";

/// SCIM Schema schema URI
pub const SCHEMA_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Schema";

// =============================================================================
// Resource Metadata
// =============================================================================

/// Resource metadata common to all SCIM resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    /// The resource type (e.g., "User", "Group", "Schema")
    pub resource_type: String,

    /// When the resource was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the resource was last modified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// The URI of the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// ETag for optimistic concurrency (e.g., "W/\"a330bc54f0671c9\"")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ScimMeta {
    /// Metadata for a stored User or Group
    pub fn resource(
        resource_type: impl Into<String>,
        created: DateTime<Utc>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            created: Some(created),
            last_modified: Some(last_modified),
            location: None,
            version: None,
        }
    }

    /// Metadata for a static discovery document
    pub fn discovery(resource_type: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            created: None,
            last_modified: None,
            location: Some(location.into()),
            version: None,
        }
    }

    /// Set the location URI
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the ETag version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

// =============================================================================
// Protocol Types (RFC 7644)
// =============================================================================

/// SCIM list response for paginated collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    /// SCIM schema URIs
    pub schemas: Vec<String>,

    /// Total number of results available
    pub total_results: usize,

    /// Number of results returned in this response
    pub items_per_page: usize,

    /// 1-based index of the first result in this response
    pub start_index: usize,

    /// The list of resources
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    /// Create a new list response
    pub fn new(resources: Vec<T>, total_results: usize, start_index: usize) -> Self {
        let items_per_page = resources.len();
        Self {
            schemas: vec![SCHEMA_LIST_RESPONSE.to_string()],
            total_results,
            items_per_page,
            start_index,
            resources,
        }
    }
}

/// Sort direction for list requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Query parameters for list operations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListParams {
    /// SCIM filter expression
    pub filter: Option<String>,

    /// 1-based start index (default: 1)
    pub start_index: Option<usize>,

    /// Number of results per page (default from `[scim] default_page_size`)
    pub count: Option<usize>,

    /// Attribute to sort by
    pub sort_by: Option<String>,

    /// Sort order ("ascending" or "descending"); anything else sorts ascending
    pub sort_order: Option<String>,

    /// Attributes to include in response
    pub attributes: Option<String>,

    /// Attributes to exclude from response
    pub excluded_attributes: Option<String>,
}

impl ScimListParams {
    /// The requested sort direction. Unrecognized values fall back to ascending.
    pub fn sort_order(&self) -> SortOrder {
        match self.sort_order.as_deref().map(str::trim) {
            Some(order) if order.eq_ignore_ascii_case("descending") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }
}

/// `attributes` / `excludedAttributes` on single-resource requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimAttributeParams {
    pub attributes: Option<String>,
    pub excluded_attributes: Option<String>,
}

// =============================================================================
// Discovery Types (RFC 7644)
// =============================================================================

/// `GET /ServiceProviderConfig` document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    pub schemas: Vec<String>,
    pub patch: FeatureSupport,
    pub bulk: BulkSupport,
    pub filter: FilterSupport,
    pub change_password: FeatureSupport,
    pub sort: FeatureSupport,
    pub etag: FeatureSupport,
    pub authentication_schemes: Vec<AuthenticationScheme>,
    pub meta: ScimMeta,
}

impl ServiceProviderConfig {
    /// Capabilities of this server; `max_results` is the page size cap.
    pub fn new(base_url: &str, max_results: usize) -> Self {
        Self {
            schemas: vec![SCHEMA_SERVICE_PROVIDER_CONFIG.to_string()],
            patch: FeatureSupport::YES,
            bulk: BulkSupport::UNSUPPORTED,
            filter: FilterSupport {
                supported: true,
                max_results,
            },
            change_password: FeatureSupport::YES,
            sort: FeatureSupport::YES,
            etag: FeatureSupport::YES,
            authentication_schemes: vec![AuthenticationScheme::oauth_bearer()],
            meta: ScimMeta::discovery(
                "ServiceProviderConfig",
                format!("{}/ServiceProviderConfig", base_url),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSupport {
    pub supported: bool,
}

impl FeatureSupport {
    const YES: Self = Self { supported: true };
}

/// Bulk requests are not served; the limits are advertised as zero.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSupport {
    pub supported: bool,
    pub max_operations: u32,
    pub max_payload_size: u32,
}

impl BulkSupport {
    const UNSUPPORTED: Self = Self {
        supported: false,
        max_operations: 0,
        max_payload_size: 0,
    };
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSupport {
    pub supported: bool,
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationScheme {
    pub name: &'static str,
    pub description: &'static str,
    pub spec_uri: &'static str,
    #[serde(rename = "type")]
    pub scheme_type: &'static str,
    pub primary: bool,
}

impl AuthenticationScheme {
    /// RFC 6750 bearer tokens, the only scheme `[[auth.tokens]]` accepts.
    pub fn oauth_bearer() -> Self {
        Self {
            name: "OAuth Bearer Token",
            description: "Authentication scheme using the OAuth Bearer Token Standard",
            spec_uri: "https://www.rfc-editor.org/info/rfc6750",
            scheme_type: "oauthbearertoken",
            primary: true,
        }
    }
}

/// `GET /ResourceTypes` entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub schemas: Vec<String>,
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schema_extensions: Vec<SchemaExtension>,
    pub meta: ScimMeta,
}

impl ResourceType {
    fn new(
        base_url: &str,
        id: &str,
        description: &str,
        schema: &str,
        extensions: &[&str],
    ) -> Self {
        Self {
            schemas: vec![SCHEMA_RESOURCE_TYPE.to_string()],
            id: id.to_string(),
            name: id.to_string(),
            endpoint: format!("/{}s", id),
            description: description.to_string(),
            schema: schema.to_string(),
            schema_extensions: extensions
                .iter()
                .map(|schema| SchemaExtension {
                    schema: schema.to_string(),
                    required: false,
                })
                .collect(),
            meta: ScimMeta::discovery("ResourceType", format!("{}/ResourceTypes/{}", base_url, id)),
        }
    }

    pub fn user(base_url: &str) -> Self {
        Self::new(base_url, "User", "User Account", SCHEMA_USER, &[SCHEMA_ENTERPRISE_USER])
    }

    pub fn group(base_url: &str) -> Self {
        Self::new(base_url, "Group", "Group", SCHEMA_GROUP, &[])
    }

    /// All resource types served, in discovery order.
    pub fn all(base_url: &str) -> Vec<Self> {
        vec![Self::user(base_url), Self::group(base_url)]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaExtension {
    pub schema: String,
    pub required: bool,
}

// =============================================================================
// Schema Definition Types (RFC 7643 Section 7)
// =============================================================================

/// `GET /Schemas` entry (RFC 7643 Section 7).
#[derive(Debug, Clone, Serialize)]
pub struct ScimSchema {
    pub schemas: Vec<String>,
    pub id: String,
    pub name: String,
    pub description: String,
    pub attributes: Vec<SchemaAttribute>,
    pub meta: ScimMeta,
}

/// Sub-attributes shared by the plain multi-valued User attributes.
fn multi_valued_item(value_description: &str) -> Vec<SchemaAttribute> {
    vec![
        SchemaAttribute::string("value", value_description, false, Mutability::ReadWrite),
        SchemaAttribute::string("display", "Human-readable name", false, Mutability::ReadWrite),
        SchemaAttribute::string("type", "Label for the value", false, Mutability::ReadWrite),
        SchemaAttribute::boolean(
            "primary",
            "Preferred value; at most one per attribute",
            false,
            Mutability::ReadWrite,
        ),
    ]
}

impl ScimSchema {
    fn new(base_url: &str, id: &str, name: &str, description: &str, attributes: Vec<SchemaAttribute>) -> Self {
        Self {
            schemas: vec![SCHEMA_SCHEMA.to_string()],
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            attributes,
            meta: ScimMeta::discovery("Schema", format!("{}/Schemas/{}", base_url, id)),
        }
    }

    /// Create the User schema definition
    pub fn user(base_url: &str) -> Self {
        let name_fields = [
            ("formatted", "Full formatted name"),
            ("familyName", "Family name (last name)"),
            ("givenName", "Given name (first name)"),
            ("middleName", "Middle name(s)"),
            ("honorificPrefix", "Honorific prefix (e.g. Ms.)"),
            ("honorificSuffix", "Honorific suffix (e.g. III)"),
        ]
        .into_iter()
        .map(|(n, d)| SchemaAttribute::string(n, d, false, Mutability::ReadWrite))
        .collect();

        let simple = [
            ("displayName", "Display name shown in UI"),
            ("nickName", "Casual name"),
            ("profileUrl", "Online profile URL"),
            ("title", "Job title"),
            ("userType", "Organization-to-user relationship"),
            ("preferredLanguage", "Preferred written or spoken language"),
            ("locale", "Default location for localization"),
            ("timezone", "Time zone in IANA format"),
        ]
        .into_iter()
        .map(|(n, d)| SchemaAttribute::string(n, d, false, Mutability::ReadWrite));

        let mut attributes = vec![
            SchemaAttribute::string(
                "userName",
                "Unique identifier for the user",
                true,
                Mutability::ReadWrite,
            )
            .with_uniqueness(Uniqueness::Server),
            SchemaAttribute::complex("name", "Name components", false, name_fields),
        ];
        attributes.extend(simple);
        attributes.extend([
            SchemaAttribute::boolean(
                "active",
                "Whether user is active",
                false,
                Mutability::ReadWrite,
            ),
            SchemaAttribute::string("password", "Cleartext password", false, Mutability::WriteOnly)
                .with_returned(Returned::Never),
            SchemaAttribute::multi_valued("emails", "Email addresses", false, multi_valued_item("Email address")),
            SchemaAttribute::multi_valued("phoneNumbers", "Phone numbers", false, multi_valued_item("Phone number")),
            SchemaAttribute::multi_valued("ims", "Instant messaging addresses", false, multi_valued_item("IM address")),
            SchemaAttribute::multi_valued("photos", "Photo URLs", false, multi_valued_item("Photo URL")),
            SchemaAttribute::multi_valued(
                "addresses",
                "Physical mailing addresses",
                false,
                [
                    "formatted",
                    "streetAddress",
                    "locality",
                    "region",
                    "postalCode",
                    "country",
                    "type",
                ]
                .into_iter()
                .map(|n| SchemaAttribute::string(n, "Address component", false, Mutability::ReadWrite))
                .chain([SchemaAttribute::boolean("primary", "Preferred address", false, Mutability::ReadWrite)])
                .collect(),
            ),
            SchemaAttribute::multi_valued(
                "groups",
                "Groups the user belongs to",
                false,
                vec![
                    SchemaAttribute::string("value", "Group id", false, Mutability::ReadOnly),
                    SchemaAttribute::string("$ref", "Group URI", false, Mutability::ReadOnly),
                    SchemaAttribute::string("display", "Group name", false, Mutability::ReadOnly),
                    SchemaAttribute::string("type", "direct or indirect", false, Mutability::ReadOnly),
                ],
            )
            .with_mutability(Mutability::ReadOnly),
            SchemaAttribute::multi_valued("entitlements", "Entitlements", false, multi_valued_item("Entitlement")),
            SchemaAttribute::multi_valued("roles", "Roles", false, multi_valued_item("Role")),
            SchemaAttribute::multi_valued(
                "x509Certificates",
                "X.509 certificates",
                false,
                multi_valued_item("DER certificate, base64"),
            ),
            SchemaAttribute::string(
                "externalId",
                "External ID from IdP",
                false,
                Mutability::ReadWrite,
            ),
        ]);

        Self::new(base_url, SCHEMA_USER, "User", "User Account", attributes)
    }

    /// Create the Group schema definition
    pub fn group(base_url: &str) -> Self {
        Self::new(
            base_url,
            SCHEMA_GROUP,
            "Group",
            "Group",
            vec![
                SchemaAttribute::string(
                    "displayName",
                    "Human-readable group name",
                    true,
                    Mutability::ReadWrite,
                )
                .with_uniqueness(Uniqueness::Server),
                SchemaAttribute::multi_valued(
                    "members",
                    "Group members",
                    false,
                    vec![
                        SchemaAttribute::string("value", "Member ID", false, Mutability::Immutable),
                        SchemaAttribute::string(
                            "$ref",
                            "Member URI reference",
                            false,
                            Mutability::Immutable,
                        ),
                        SchemaAttribute::string(
                            "display",
                            "Member display name",
                            false,
                            Mutability::Immutable,
                        ),
                        SchemaAttribute::string("type", "User or Group", false, Mutability::Immutable),
                    ],
                ),
                SchemaAttribute::string(
                    "externalId",
                    "External ID from IdP",
                    false,
                    Mutability::ReadWrite,
                ),
            ],
        )
    }

    /// Create the Enterprise User extension definition
    pub fn enterprise_user(base_url: &str) -> Self {
        let mut attributes: Vec<SchemaAttribute> = [
            ("employeeNumber", "Organization-assigned employee number"),
            ("costCenter", "Cost center"),
            ("organization", "Organization name"),
            ("division", "Division name"),
            ("department", "Department name"),
        ]
        .into_iter()
        .map(|(n, d)| SchemaAttribute::string(n, d, false, Mutability::ReadWrite))
        .collect();

        attributes.push(SchemaAttribute::complex(
            "manager",
            "The user's manager",
            false,
            vec![
                SchemaAttribute::string("value", "Manager id", false, Mutability::ReadWrite),
                SchemaAttribute::string("$ref", "Manager URI", false, Mutability::ReadOnly),
                SchemaAttribute::string(
                    "displayName",
                    "Manager display name",
                    false,
                    Mutability::ReadOnly,
                ),
            ],
        ));

        Self::new(
            base_url,
            SCHEMA_ENTERPRISE_USER,
            "EnterpriseUser",
            "Enterprise User",
            attributes,
        )
    }

    /// All schemas served, in discovery order.
    pub fn all(base_url: &str) -> Vec<Self> {
        vec![
            Self::user(base_url),
            Self::group(base_url),
            Self::enterprise_user(base_url),
        ]
    }
}

/// One attribute of a schema; complex attributes carry `subAttributes`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub multi_valued: bool,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_exact: Option<bool>,
    pub mutability: Mutability,
    pub returned: Returned,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniqueness: Option<Uniqueness>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<SchemaAttribute>,
}

impl SchemaAttribute {
    fn base(name: &str, attr_type: AttributeType, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            multi_valued: false,
            description: description.to_string(),
            required,
            case_exact: None,
            mutability: Mutability::ReadWrite,
            returned: Returned::Default,
            uniqueness: None,
            sub_attributes: Vec::new(),
        }
    }

    /// Strings are advertised as case-insensitive.
    pub fn string(name: &str, description: &str, required: bool, mutability: Mutability) -> Self {
        Self {
            case_exact: Some(false),
            mutability,
            ..Self::base(name, AttributeType::String, description, required)
        }
    }

    pub fn boolean(name: &str, description: &str, required: bool, mutability: Mutability) -> Self {
        Self {
            mutability,
            ..Self::base(name, AttributeType::Boolean, description, required)
        }
    }

    pub fn complex(
        name: &str,
        description: &str,
        required: bool,
        sub_attributes: Vec<SchemaAttribute>,
    ) -> Self {
        Self {
            sub_attributes,
            ..Self::base(name, AttributeType::Complex, description, required)
        }
    }

    pub fn multi_valued(
        name: &str,
        description: &str,
        required: bool,
        sub_attributes: Vec<SchemaAttribute>,
    ) -> Self {
        Self {
            multi_valued: true,
            ..Self::complex(name, description, required, sub_attributes)
        }
    }

    pub fn with_uniqueness(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = Some(uniqueness);
        self
    }

    pub fn with_returned(mut self, returned: Returned) -> Self {
        self.returned = returned;
        self
    }

    pub fn with_mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Boolean,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    ReadWrite,
    Immutable,
    WriteOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Returned {
    Default,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Uniqueness {
    Server,
}

// =============================================================================
// Tests
// =============================================================================
