use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    epo_harvest::apps::run_fetch_publication_archives(std::env::args().skip(1))
}
