const COMMANDS: &[&str] = &["share", "share_multiple", "respond_chooser", "cleanup"];

fn main() {
  tauri_plugin::Builder::new(COMMANDS)
    .android_path("android")
    .ios_path("ios")
    .build();
}
