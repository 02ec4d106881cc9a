//! List the content tree

use anyhow::Result;

use crate::content::{ContentTreeBuilder, Page, Site};
use crate::DocSite;

/// Print every page in tree order, then any content issues
pub async fn run(app: &DocSite) -> Result<()> {
    let builder = ContentTreeBuilder::new(
        app.settings.clone(),
        app.config.clone(),
        app.content_dir.clone(),
    );
    let (site, issues) = builder.build().await?;

    println!("Pages ({}):", site.len());
    for line in tree_lines(&site) {
        println!("{}", line);
    }

    if !issues.is_empty() {
        println!("Issues ({}):", issues.len());
        for issue in issues {
            println!("  {}", issue);
        }
    }

    Ok(())
}

/// One line per page, indented by level
pub fn tree_lines(site: &Site) -> Vec<String> {
    site.walk().into_iter().map(line).collect()
}

fn line(page: &Page) -> String {
    format!(
        "{}{} {} [{}]",
        "  ".repeat(page.level + 1),
        if page.is_section() { "+" } else { "-" },
        page.title,
        page.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::sample_site;

    #[test]
    fn test_tree_lines() {
        let lines = tree_lines(&sample_site());
        assert_eq!(
            lines,
            vec![
                "  + Home [/]",
                "    + db [/db]",
                "      - getting started [/db/getting-started]",
                "      - examples [/db/examples]",
                "    - about [/about]",
            ]
        );
    }
}
