//! Declaration validation
//!
//! Validation collects every problem instead of stopping at the first one,
//! so a user can fix a declaration in one pass.

use crate::error::{Error, Result};
use crate::types::{ApplicationDeclaration, ClusterDeclaration};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid DNS label pattern")
});

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("valid domain pattern")
});

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("valid account id pattern"));

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("valid region pattern")
});

static DB_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("valid user pattern"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

static CIDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})$")
        .expect("valid CIDR pattern")
});

/// Smallest and largest prefix length accepted for a VPC network
const VPC_PREFIX_RANGE: std::ops::RangeInclusive<u8> = 16..=28;

impl ClusterDeclaration {
    /// Check names, network shape and integration dependencies
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        check_label(&mut problems, "metadata.name", &self.metadata.name);
        check_label(&mut problems, "metadata.environment", &self.metadata.environment);

        if !REGION.is_match(&self.metadata.region) {
            problems.push(format!(
                "metadata.region '{}' is not a region name",
                self.metadata.region
            ));
        }

        if !ACCOUNT_ID.is_match(&self.metadata.account_id) {
            problems.push(format!(
                "metadata.account_id '{}' must be exactly 12 digits",
                self.metadata.account_id
            ));
        }

        if !DOMAIN.is_match(&self.cluster_root_domain) {
            problems.push(format!(
                "cluster_root_domain '{}' is not a lowercase domain name",
                self.cluster_root_domain
            ));
        }

        if self.github.organisation.trim().is_empty() {
            problems.push("github.organisation cannot be empty".to_string());
        }
        if self.github.repository.trim().is_empty() {
            problems.push("github.repository cannot be empty".to_string());
        }

        if let Err(reason) = check_cidr(&self.vpc.cidr) {
            problems.push(format!("vpc.cidr '{}' {reason}", self.vpc.cidr));
        }

        let integrations = &self.integrations;
        let requirements = [
            (integrations.argocd, "argocd", integrations.identity_manager, "identity_manager"),
            (
                integrations.kube_prometheus_stack,
                "kube_prometheus_stack",
                integrations.identity_manager,
                "identity_manager",
            ),
            (integrations.loki, "loki", integrations.kube_prometheus_stack, "kube_prometheus_stack"),
            (integrations.promtail, "promtail", integrations.loki, "loki"),
            (integrations.tempo, "tempo", integrations.kube_prometheus_stack, "kube_prometheus_stack"),
        ];
        for (enabled, name, dependency_enabled, dependency) in requirements {
            if enabled && !dependency_enabled {
                problems.push(format!("integrations.{name} requires integrations.{dependency}"));
            }
        }

        if self.has_users() && !integrations.identity_manager {
            problems.push("users require integrations.identity_manager".to_string());
        }

        for user in &self.users {
            if !EMAIL.is_match(&user.email) {
                problems.push(format!("user '{}' is not an email address", user.email));
            }
        }

        let mut seen = HashSet::new();
        for db in self.postgres_databases() {
            let field = format!("databases.postgres[{}]", db.name);
            check_label(&mut problems, &format!("{field}.name"), &db.name);
            check_label(&mut problems, &format!("{field}.namespace"), &db.namespace);
            if !DB_USER.is_match(&db.user) {
                problems.push(format!(
                    "{field}.user '{}' must start with a letter and contain only a-z, 0-9 and _",
                    db.user
                ));
            }
            if !seen.insert(db.name.as_str()) {
                problems.push(format!("database name '{}' is declared more than once", db.name));
            }
        }

        finish(problems)
    }
}

impl ApplicationDeclaration {
    /// Check names, image and exposure settings
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        check_label(&mut problems, "metadata.name", &self.metadata.name);
        check_label(&mut problems, "metadata.namespace", &self.metadata.namespace);
        check_label(&mut problems, "cluster.environment", &self.cluster.environment);

        match (&self.image.name, &self.image.uri) {
            (Some(_), Some(_)) => {
                problems.push("image.name and image.uri are mutually exclusive".to_string());
            }
            (None, None) => problems.push("image requires either name or uri".to_string()),
            (Some(name), None) => check_label(&mut problems, "image.name", name),
            (None, Some(uri)) if uri.trim().is_empty() => {
                problems.push("image.uri cannot be empty".to_string());
            }
            (None, Some(_)) => {}
        }

        if let Some(subdomain) = &self.subdomain {
            check_label(&mut problems, "subdomain", subdomain);
        }

        if self.port == 0 {
            problems.push("port must be between 1 and 65535".to_string());
        }

        finish(problems)
    }
}

fn check_label(problems: &mut Vec<String>, field: &str, value: &str) {
    if !DNS_LABEL.is_match(value) {
        problems.push(format!(
            "{field} '{value}' must be a lowercase DNS label (a-z, 0-9 and -, at most 63 characters)"
        ));
    }
}

fn check_cidr(cidr: &str) -> std::result::Result<(), String> {
    let captures = CIDR
        .captures(cidr)
        .ok_or_else(|| "is not in a.b.c.d/n form".to_string())?;

    for octet in 1..=4 {
        if captures[octet].parse::<u8>().is_err() {
            return Err(format!("has an octet above 255 ({})", &captures[octet]));
        }
    }

    let prefix: u8 = captures[5]
        .parse()
        .map_err(|_| "has an invalid prefix length".to_string())?;
    if !VPC_PREFIX_RANGE.contains(&prefix) {
        return Err(format!(
            "prefix /{prefix} is outside /{} to /{}",
            VPC_PREFIX_RANGE.start(),
            VPC_PREFIX_RANGE.end()
        ));
    }

    Ok(())
}

fn finish(problems: Vec<String>) -> Result<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        log::debug!("Declaration has {} problem(s)", problems.len());
        Err(Error::Invalid(problems))
    }
}
