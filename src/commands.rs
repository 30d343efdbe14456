use crate::cache::CacheStore;
use crate::cli::CommonArgs;
use crate::identity::{learn_into, IdentitySet, DEFAULT_IDENTITY_PAGES};
use crate::model::RepoTarget;
use crate::remote::GitHubClient;
use anyhow::Context;
use console::style;

pub fn exec_identities(common: CommonArgs, learn: Option<String>) -> anyhow::Result<()> {
    let mut identities = IdentitySet::load(&common.identity_file);

    if let Some(spec) = learn {
        let user = common.require_user()?;
        let target: RepoTarget = spec.parse().context("Invalid repository target")?;
        let api = GitHubClient::new(&common.api_url, common.token.clone())
            .context("Failed to build API client")?;
        let added = learn_into(
            &mut identities,
            &api,
            &target.owner,
            &target.name,
            user,
            DEFAULT_IDENTITY_PAGES,
        );
        println!("Learned {} new identities from {}", style(added).cyan(), target.key());
    }

    if identities.is_empty() {
        println!("No identities learned yet.");
        return Ok(());
    }
    println!("{}", style("Known identities").bold());
    for identity in identities.iter() {
        println!("  {identity}");
    }
    Ok(())
}

pub fn exec_clear_cache(common: CommonArgs) -> anyhow::Result<()> {
    let store = CacheStore::new(&common.cache_dir);
    let removed = store
        .clear()
        .with_context(|| format!("Failed to clear {}", store.dir().display()))?;
    if removed {
        println!("Cache cleared: {}", store.dir().display());
    } else {
        println!("No cache at {}", store.dir().display());
    }
    Ok(())
}
