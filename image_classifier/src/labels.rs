use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Reads one label per line. Blank lines are skipped.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();
        if label.is_empty() {
            continue;
        }
        labels.push(label.to_string());
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No labels found in {:?}", filepath),
        ));
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let path = write_fixture("labels.txt", "tabby cat\n\n  golden retriever \nsparrow\n");

        let labels = load_labels(&path).unwrap();

        assert_eq!(labels, vec!["tabby cat", "golden retriever", "sparrow"]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_labels_rejects_empty_file() {
        let path = write_fixture("empty_labels.txt", "\n\n");

        let err = load_labels(&path).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_labels_missing_file() {
        let path = std::env::temp_dir().join("does-not-exist-labels.txt");

        assert!(load_labels(&path).is_err());
    }
}
