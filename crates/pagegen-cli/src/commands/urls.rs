use anyhow::Result;
use pagegen_core::Registry;

pub fn list_urls(limit: Option<usize>, json: bool) -> Result<()> {
    let urls: Vec<String> = Registry::new()
        .programmatic_urls()
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&urls)?);
    } else {
        for url in urls {
            println!("{url}");
        }
    }
    Ok(())
}
