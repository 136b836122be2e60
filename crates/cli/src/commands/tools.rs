//! The `tools` command — print the tool definitions a domain would expose.

use hearthmind_config::AppConfig;

pub async fn run(domain: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::default();
    config.store.backend = "memory".into();
    if let Some(domain) = domain {
        config.server.domain = domain;
        config.validate()?;
    }

    let server = super::serve::build_server(&config).await?;
    println!("{}", serde_json::to_string_pretty(&server.list_tools())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_for_family_domain_has_only_standard_tools() {
        let mut config = AppConfig::default();
        config.store.backend = "memory".into();
        config.server.domain = "family".into();

        let server = super::super::serve::build_server(&config).await.unwrap();
        assert_eq!(server.list_tools().len(), 4);
    }
}
