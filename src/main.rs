fn main() {
    let mut dump_pages = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ninegag-feed {}", ninegag_feed::VERSION);
                return;
            }
            "--help" | "-h" => {
                println!(
                    "ninegag-feed — Page through the 9GAG hot feed.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --dump N             Print pages 1..=N to stdout and exit\n\nWithout flags, serves the feed over HTTP (see server.listen_addr)."
                );
                return;
            }
            "--dump" => {
                let pages = args.next().and_then(|value| value.parse::<u32>().ok());
                match pages {
                    Some(pages) if pages > 0 => dump_pages = Some(pages),
                    _ => {
                        eprintln!("error: --dump needs a page count of at least 1");
                        std::process::exit(2);
                    }
                }
            }
            other => {
                eprintln!("error: unknown argument {other:?} (try --help)");
                std::process::exit(2);
            }
        }
    }

    let result = match dump_pages {
        Some(pages) => ninegag_feed::dump(pages),
        None => ninegag_feed::run(),
    };
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
