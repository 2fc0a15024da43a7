use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    epo_harvest::apps::run_retrieve_documents(std::env::args().skip(1))
}
