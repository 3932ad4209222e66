//! Deterministic identifiers derived from tenant, product and environment.
//!
//! CloudFormation treats an unchanged identifier as "update in place" and a changed one as
//! "replace", so every function here must return the same string for the same inputs.

/// Upper-cases the first character of `s`, leaving the remainder untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of the stack for a tenant, product and environment (e.g. `AbcDbxAppProxyDev`).
pub fn stack_id(tenant: &str, product: &str, environment: &str) -> String {
    format!(
        "{}{}{}",
        capitalize(tenant),
        capitalize(product),
        capitalize(environment)
    )
}

/// Path of the container log group (e.g. `/abc/dbxappproxy/dev/ecs`).
pub fn log_path(tenant: &str, product: &str, environment: &str) -> String {
    format!(
        "/{}/{}/{}/ecs",
        tenant.to_lowercase(),
        product.to_lowercase(),
        environment.to_lowercase()
    )
}

/// Parameter store key holding the id of the tenant's baseline network.
pub fn vpc_parameter(tenant: &str) -> String {
    format!("/{tenant}/baseline/network/vpc-id")
}

/// Strips the trailing root label from a DNS name, if present.
pub fn normalize_zone(zone: &str) -> &str {
    zone.strip_suffix('.').unwrap_or(zone)
}

/// Fully qualified name served by the proxy (`{hostname}.{zone}`).
pub fn record_name(hostname: &str, zone: &str) -> String {
    format!("{hostname}.{}", normalize_zone(zone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("abc"), "Abc");
        assert_eq!(capitalize("Abc"), "Abc");
        assert_eq!(capitalize("dbxAppProxy"), "DbxAppProxy");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("émile"), "Émile");
    }

    #[test]
    fn test_stack_id() {
        assert_eq!(stack_id("Abc", "DbxAppProxy", "Dev"), "AbcDbxAppProxyDev");
        assert_eq!(stack_id("abc", "dbxAppProxy", "prod"), "AbcDbxAppProxyProd");
    }

    #[test]
    fn test_log_path() {
        assert_eq!(
            log_path("Abc", "DbxAppProxy", "Dev"),
            "/abc/dbxappproxy/dev/ecs"
        );
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                stack_id("Abc", "DbxAppProxy", "Dev"),
                stack_id("Abc", "DbxAppProxy", "Dev")
            );
            assert_eq!(
                log_path("Abc", "DbxAppProxy", "Dev"),
                log_path("Abc", "DbxAppProxy", "Dev")
            );
        }
    }

    #[test]
    fn test_record_name() {
        assert_eq!(record_name("proxy", "example.com"), "proxy.example.com");
        assert_eq!(record_name("proxy", "example.com."), "proxy.example.com");
    }

    #[test]
    fn test_vpc_parameter() {
        assert_eq!(vpc_parameter("Abc"), "/Abc/baseline/network/vpc-id");
    }
}
