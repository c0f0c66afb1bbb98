use cmdkit_demo::App;

fn main() -> anyhow::Result<()> {
    let app = App::new()?;
    let matches = app.command().get_matches();
    app.run(&matches)
}
