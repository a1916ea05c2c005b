//! SCIM Filter Expression Parser
//!
//! Parses filter strings from `GET /Users?filter=...` query parameters and from
//! PATCH value selectors (`emails[type eq "work"]`) into a [`FilterNode`] tree.
//!
//! ## Grammar
//!
//! ```text
//! filter     = and-chain / or-chain / "not " filter / "(" filter ")" / comparison
//! comparison = attrPath SP compareOp [SP compValue]
//! compareOp  = "eq" / "ne" / "co" / "sw" / "ew" / "pr" / "gt" / "ge" / "lt" / "le"
//! compValue  = quoted-string / "true" / "false" / number / bare-token
//! ```
//!
//! ## Connective scan order
//!
//! The expression is split on top-level `and` before `or` is considered, and the
//! parts are folded left-to-right. There is no precedence between the two
//! connectives: `a or b and c` parses as `And(Or(a, b), c)`. Existing clients
//! depend on this ordering, so parenthesise mixed expressions to be explicit.
//!
//! Attribute names are not checked here. Unknown attributes are resolved by the
//! evaluator, which treats them as matching everything.

use std::{fmt, sync::LazyLock};

use regex::Regex;

use super::error::{ScimError, ScimResult};

/// Maximum filter string length accepted by [`parse_filter`].
pub const MAX_FILTER_LENGTH: usize = 4096;

/// Maximum nesting depth of not/parenthesis/connective recursion.
const MAX_FILTER_DEPTH: usize = 32;

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(\S+)\s+(eq|ne|co|sw|ew|pr|gt|ge|lt|le)(?:\s+(.*))?$").expect("valid regex")
});

// =============================================================================
// Filter AST
// =============================================================================

/// Parsed SCIM filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `attribute operator value`; `value` is `None` only for `pr`
    Comparison {
        attribute: String,
        operator: Operator,
        value: Option<FilterValue>,
    },
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
    Not(Box<FilterNode>),
}

impl FilterNode {
    pub fn comparison(
        attribute: impl Into<String>,
        operator: Operator,
        value: Option<FilterValue>,
    ) -> Self {
        Self::Comparison {
            attribute: attribute.into(),
            operator,
            value,
        }
    }
}

/// Comparison operators (RFC 7644 Section 3.4.2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Present (has a value)
    Pr,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "co" => Some(Self::Co),
            "sw" => Some(Self::Sw),
            "ew" => Some(Self::Ew),
            "pr" => Some(Self::Pr),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    /// Ordering operators try a numeric comparison first.
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Ge | Self::Lt | Self::Le)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Pr => "pr",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        };
        f.write_str(s)
    }
}

/// Comparison value in a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Quoted string or bare token
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
}

impl FilterValue {
    /// Case-folded rendering used by the evaluator's string comparisons.
    pub fn to_comparable(&self) -> String {
        match self {
            Self::String(s) => s.to_lowercase(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => format_float(*f),
        }
    }

    /// Numeric value, if this value is or parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
    }
}

/// Render floats the way JSON serialization does, so `1.0` stays `1.0`.
pub(crate) fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Parse a SCIM filter string.
///
/// Whitespace runs are collapsed before parsing. Empty input and malformed
/// comparisons fail with `InvalidFilter`.
pub fn parse_filter(input: &str) -> ScimResult<FilterNode> {
    if input.len() > MAX_FILTER_LENGTH {
        return Err(ScimError::invalid_filter(format!(
            "filter exceeds maximum length of {} bytes",
            MAX_FILTER_LENGTH
        )));
    }

    let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(ScimError::invalid_filter("filter cannot be empty"));
    }

    parse_expression(&normalized, 0)
}

fn parse_expression(expr: &str, depth: usize) -> ScimResult<FilterNode> {
    if depth > MAX_FILTER_DEPTH {
        return Err(ScimError::invalid_filter(format!(
            "filter nesting exceeds maximum depth of {}",
            MAX_FILTER_DEPTH
        )));
    }

    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ScimError::invalid_filter("empty sub-expression"));
    }

    let lowered = expr.to_lowercase();

    // `and` is always tried before `or`; see module docs.
    if lowered.contains(" and ")
        && let Some(node) = parse_connective(expr, Connective::And, depth)?
    {
        return Ok(node);
    }
    if lowered.contains(" or ")
        && let Some(node) = parse_connective(expr, Connective::Or, depth)?
    {
        return Ok(node);
    }

    if expr
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("not "))
    {
        let inner = parse_expression(&expr[4..], depth + 1)?;
        return Ok(FilterNode::Not(Box::new(inner)));
    }

    if expr.starts_with('(') && expr.ends_with(')') {
        return parse_expression(&expr[1..expr.len() - 1], depth + 1);
    }

    parse_comparison(expr)
}

#[derive(Debug, Clone, Copy)]
enum Connective {
    And,
    Or,
}

impl Connective {
    fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Split on the connective at paren depth 0 and fold the parts left-to-right.
///
/// Returns `None` when the keyword only occurs inside parentheses or quotes, so
/// the caller can fall through to the next rule.
fn parse_connective(
    expr: &str,
    connective: Connective,
    depth: usize,
) -> ScimResult<Option<FilterNode>> {
    let parts = split_top_level(expr, connective.keyword());
    if parts.len() < 2 {
        return Ok(None);
    }

    let mut nodes = parts
        .iter()
        .map(|part| parse_expression(part, depth + 1))
        .collect::<ScimResult<Vec<_>>>()?
        .into_iter();

    // parts.len() >= 2, so there is always a first node
    let Some(mut acc) = nodes.next() else {
        return Ok(None);
    };
    for node in nodes {
        acc = match connective {
            Connective::And => FilterNode::And(Box::new(acc), Box::new(node)),
            Connective::Or => FilterNode::Or(Box::new(acc), Box::new(node)),
        };
    }
    Ok(Some(acc))
}

/// Split `expr` on whitespace-delimited `keyword` tokens that sit outside
/// parentheses and quoted strings.
fn split_top_level(expr: &str, keyword: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut paren_depth: i32 = 0;
    let mut quote: Option<char> = None;

    for token in expr.split(' ') {
        if paren_depth == 0 && quote.is_none() && token.eq_ignore_ascii_case(keyword) {
            parts.push(current.join(" "));
            current.clear();
            continue;
        }

        let mut chars = token.chars();
        let mut at_start = true;
        while let Some(c) = chars.next() {
            match (quote, c) {
                (Some(_), '\\') => {
                    chars.next();
                }
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                // Quotes only open a string at the start of a token, after any parens
                (None, '"') | (None, '\'') if at_start => quote = Some(c),
                (None, '(') => paren_depth += 1,
                (None, ')') => paren_depth -= 1,
                _ => {}
            }
            at_start = at_start && c == '(';
        }
        current.push(token);
    }

    if !current.is_empty() {
        parts.push(current.join(" "));
    }
    parts
}

fn parse_comparison(expr: &str) -> ScimResult<FilterNode> {
    let caps = COMPARISON
        .captures(expr)
        .ok_or_else(|| ScimError::invalid_filter(format!("invalid expression '{}'", expr)))?;

    let attribute = caps[1].to_string();
    let operator = Operator::from_token(&caps[2])
        .ok_or_else(|| ScimError::invalid_filter(format!("unknown operator '{}'", &caps[2])))?;
    let raw_value = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");

    if operator == Operator::Pr {
        return Ok(FilterNode::comparison(attribute, operator, None));
    }

    if raw_value.is_empty() {
        return Err(ScimError::invalid_filter(format!(
            "operator '{}' on '{}' requires a value",
            operator, attribute
        )));
    }

    Ok(FilterNode::comparison(
        attribute,
        operator,
        Some(parse_value(raw_value)),
    ))
}

fn parse_value(raw: &str) -> FilterValue {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        return FilterValue::String(raw[1..raw.len() - 1].replace("\\\"", "\""));
    }

    if raw.eq_ignore_ascii_case("true") {
        return FilterValue::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return FilterValue::Boolean(false);
    }

    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return FilterValue::Float(f);
        }
    } else if let Ok(n) = raw.parse::<i64>() {
        return FilterValue::Integer(n);
    }

    FilterValue::String(raw.to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn cmp(attr: &str, op: Operator, value: FilterValue) -> FilterNode {
        FilterNode::comparison(attr, op, Some(value))
    }

    fn s(value: &str) -> FilterValue {
        FilterValue::String(value.to_string())
    }

    #[test]
    fn test_simple_eq() {
        let node = parse_filter(r#"userName eq "john@example.com""#).unwrap();
        assert_eq!(node, cmp("userName", Operator::Eq, s("john@example.com")));
    }

    #[rstest]
    #[case("eq", Operator::Eq)]
    #[case("NE", Operator::Ne)]
    #[case("Co", Operator::Co)]
    #[case("sw", Operator::Sw)]
    #[case("ew", Operator::Ew)]
    #[case("gt", Operator::Gt)]
    #[case("ge", Operator::Ge)]
    #[case("lt", Operator::Lt)]
    #[case("LE", Operator::Le)]
    fn test_operators_case_insensitive(#[case] token: &str, #[case] expected: Operator) {
        let node = parse_filter(&format!(r#"title {} "x""#, token)).unwrap();
        match node {
            FilterNode::Comparison { operator, .. } => assert_eq!(operator, expected),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_present_takes_no_value() {
        let node = parse_filter("title pr").unwrap();
        assert_eq!(node, FilterNode::comparison("title", Operator::Pr, None));
    }

    #[rstest]
    #[case("active eq true", FilterValue::Boolean(true))]
    #[case("active eq FALSE", FilterValue::Boolean(false))]
    #[case("age gt 42", FilterValue::Integer(42))]
    #[case("score ge 1.5", FilterValue::Float(1.5))]
    #[case("title eq 'single'", FilterValue::String("single".into()))]
    #[case("title eq bare", FilterValue::String("bare".into()))]
    fn test_value_forms(#[case] input: &str, #[case] expected: FilterValue) {
        match parse_filter(input).unwrap() {
            FilterNode::Comparison { value, .. } => assert_eq!(value, Some(expected)),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let node = parse_filter("  userName   eq    \"bob\"  ").unwrap();
        assert_eq!(node, cmp("userName", Operator::Eq, s("bob")));
    }

    #[test]
    fn test_and() {
        let node = parse_filter(r#"active eq true and userName sw "bob""#).unwrap();
        assert_eq!(
            node,
            FilterNode::And(
                Box::new(cmp("active", Operator::Eq, FilterValue::Boolean(true))),
                Box::new(cmp("userName", Operator::Sw, s("bob"))),
            )
        );
    }

    #[test]
    fn test_and_chain_folds_left() {
        let node = parse_filter("a eq 1 and b eq 2 and c eq 3").unwrap();
        match node {
            FilterNode::And(left, right) => {
                assert!(matches!(*left, FilterNode::And(_, _)));
                assert_eq!(*right, cmp("c", Operator::Eq, FilterValue::Integer(3)));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_or() {
        let node = parse_filter(r#"title eq "a" OR title eq "b""#).unwrap();
        assert!(matches!(node, FilterNode::Or(_, _)));
    }

    #[test]
    fn test_mixed_connectives_split_on_and_first() {
        // No precedence: `and` is split first, so the `or` ends up nested
        // inside the left operand.
        let node = parse_filter("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert_eq!(
            node,
            FilterNode::And(
                Box::new(FilterNode::Or(
                    Box::new(cmp("a", Operator::Eq, FilterValue::Integer(1))),
                    Box::new(cmp("b", Operator::Eq, FilterValue::Integer(2))),
                )),
                Box::new(cmp("c", Operator::Eq, FilterValue::Integer(3))),
            )
        );
    }

    #[test]
    fn test_parentheses_group_connectives() {
        let node = parse_filter("a eq 1 or (b eq 2 and c eq 3)").unwrap();
        match node {
            FilterNode::Or(left, right) => {
                assert_eq!(*left, cmp("a", Operator::Eq, FilterValue::Integer(1)));
                assert!(matches!(*right, FilterNode::And(_, _)));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_fully_parenthesised_expression() {
        let node = parse_filter(r#"(userName eq "bob")"#).unwrap();
        assert_eq!(node, cmp("userName", Operator::Eq, s("bob")));
    }

    #[test]
    fn test_not() {
        let node = parse_filter(r#"not (title eq "x")"#).unwrap();
        assert_eq!(
            node,
            FilterNode::Not(Box::new(cmp("title", Operator::Eq, s("x"))))
        );
    }

    #[test]
    fn test_keyword_inside_quotes_is_not_a_connective() {
        let node = parse_filter(r#"title eq "rock and roll""#).unwrap();
        assert_eq!(node, cmp("title", Operator::Eq, s("rock and roll")));
    }

    #[test]
    fn test_escaped_quote_keeps_string_open() {
        let node = parse_filter(r#"title eq "say \"hi and bye\"""#).unwrap();
        assert_eq!(node, cmp("title", Operator::Eq, s(r#"say "hi and bye""#)));
    }

    #[rstest]
    #[case(r#"title eq O'Brien and userName pr"#, "O'Brien")]
    #[case(r#"title eq "a\"b" and userName pr"#, r#"a"b"#)]
    #[case(r#"(title eq "x") and userName pr"#, "x")]
    fn test_connective_after_quote_characters(#[case] input: &str, #[case] title: &str) {
        assert_eq!(
            parse_filter(input).unwrap(),
            FilterNode::And(
                Box::new(cmp("title", Operator::Eq, s(title))),
                Box::new(FilterNode::comparison("userName", Operator::Pr, None)),
            )
        );
    }

    #[test]
    fn test_dotted_and_urn_attributes() {
        let node = parse_filter(r#"name.givenName eq "Ann""#).unwrap();
        assert_eq!(node, cmp("name.givenName", Operator::Eq, s("Ann")));

        let node = parse_filter(
            r#"urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:department eq "R&D""#,
        )
        .unwrap();
        match node {
            FilterNode::Comparison { attribute, .. } => assert!(attribute.ends_with(":department")),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_attribute_is_not_a_parse_error() {
        assert!(parse_filter(r#"bogus eq "x""#).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("userName")]
    #[case("userName eq")]
    #[case("userName like \"x\"")]
    #[case("eq \"a\"")]
    fn test_invalid_filters(#[case] input: &str) {
        assert!(matches!(
            parse_filter(input),
            Err(ScimError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_filter_too_long() {
        let long = format!("userName eq \"{}\"", "a".repeat(MAX_FILTER_LENGTH));
        assert!(matches!(
            parse_filter(&long),
            Err(ScimError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut expr = "title pr".to_string();
        for _ in 0..(MAX_FILTER_DEPTH + 2) {
            expr = format!("not ({})", expr);
        }
        assert!(matches!(
            parse_filter(&expr),
            Err(ScimError::InvalidFilter(_))
        ));
    }
}
