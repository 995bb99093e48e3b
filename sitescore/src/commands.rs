use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitescore")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitescore")
        .arg(arg!(-q --"quiet" "Suppress spinner and non-essential output").required(false))
        .subcommand_required(true)
        .subcommand(
            command!("audit")
                .about("Crawl a site, classify SEO defects and compute audit scores")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The seed URL to audit")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-p --"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to fetch")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                )
                .arg(
                    arg!(-d --"max-depth" <NUM>)
                        .required(false)
                        .help("Maximum link depth from the seed (unset = unlimited)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <MS>)
                        .required(false)
                        .help("Per-request timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10000"),
                )
                .arg(
                    arg!(--"retries" <NUM>)
                        .required(false)
                        .help("Retry attempts per failing URL")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"retry-delay" <MS>)
                        .required(false)
                        .help("Fixed pause between retries in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("500"),
                )
                .arg(arg!(--"respect-robots" "Honor robots.txt disallow rules").required(false))
                .arg(arg!(--"external" "Follow links to other domains").required(false))
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Write the full audit bundle to this directory")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"sitemap" <PATH>)
                        .required(false)
                        .help("Write a sitemap XML of the crawled pages")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(arg!(--"json" "Print the analysis result as JSON").required(false)),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a site and print the traversal summary only")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The seed URL to crawl")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-p --"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to fetch")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                )
                .arg(
                    arg!(-d --"max-depth" <NUM>)
                        .required(false)
                        .help("Maximum link depth from the seed (unset = unlimited)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <MS>)
                        .required(false)
                        .help("Per-request timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10000"),
                )
                .arg(arg!(--"respect-robots" "Honor robots.txt disallow rules").required(false)),
        )
        .subcommand(
            command!("estimate")
                .about("Project the total page count of a site from a URL sample")
                .arg(
                    arg!(--"platform" <HINT>)
                        .required(false)
                        .help("Platform hint (shopify, woocommerce, magento, wordpress, ...)")
                        .default_value("unknown"),
                )
                .arg(
                    arg!(--"domain" <DOMAIN>)
                        .required(true)
                        .help("The site's domain, e.g. example.com"),
                )
                .arg(
                    arg!(-s --"sample" <PATH>)
                        .required(false)
                        .help("Newline-delimited file of sampled URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(arg!(--"probe" "Allow one probe fetch for storefront platforms").required(false)),
        )
}
