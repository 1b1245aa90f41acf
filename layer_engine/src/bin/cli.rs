use layer_engine::{LayerError, run};

fn main() -> Result<(), LayerError> {
    env_logger::init();
    run(std::env::args().collect())
}
