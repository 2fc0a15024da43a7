use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    epo_harvest::apps::run_find_weekly_documents(std::env::args().skip(1))
}
