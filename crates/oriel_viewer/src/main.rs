mod app;
mod input;
mod renderer;
mod settings;

fn main() {
    app::run();
}
