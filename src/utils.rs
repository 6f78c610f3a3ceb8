use crate::config::Config;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Sets up the work folders: game lists, data checkpoints, spreadsheets and
/// the image mirror when one is configured.
pub fn setup_folders(config: &Config) -> Result<()> {
    check_folder(&config.work_path(), &config.work_folder)?;
    check_folder(&config.games_list_folder(), "games_list")?;
    check_folder(&config.data_folder(), "data")?;
    check_folder(&config.excel_folder(), "excels")?;
    if let (Some(path), Some(name)) = (config.image_folder_path(), &config.image_folder) {
        check_folder(&path, name)?;
    }
    Ok(())
}

/// Creates a folder if missing, or errors if a file with the same name exists.
fn check_folder(folder_path: &Path, folder_name: &str) -> Result<()> {
    if !folder_path.exists() {
        fs::create_dir_all(folder_path)
            .map_err(|e| anyhow::anyhow!("Error creating '{}' folder: {}", folder_name, e))?;
    } else if !folder_path.is_dir() {
        anyhow::bail!("Please remove the file named as {}", folder_name);
    }
    Ok(())
}
