use flock_scene::SceneConfig;

fn main() -> anyhow::Result<()> {
    flock_scene::run(SceneConfig::default())
}
