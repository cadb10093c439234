// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Renders the templates shipped under `deploy/` the way the service
//! entrypoints do.

use std::path::PathBuf;

use tempfile::TempDir;
use wpstack_core::template::{Variables, render, render_file};

fn deploy_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../deploy")
}

fn read(rel: &str) -> String {
    std::fs::read_to_string(deploy_dir().join(rel)).unwrap()
}

#[test]
fn test_nginx_server_block() {
    let mut vars = Variables::new();
    vars.insert("DOMAIN_NAME", "example.test");

    let conf = render(&read("nginx/default.conf.template"), &vars).unwrap();

    assert!(!conf.contains("${"));
    assert!(conf.contains("server_name example.test;"));
    assert!(conf.contains("return 301 https://example.test$request_uri;"));
    // nginx runtime variables pass through untouched.
    assert!(conf.contains("$document_root$fastcgi_script_name"));
    assert!(conf.contains("fastcgi_pass  wordpress:9000;"));
    assert!(conf.contains("/etc/nginx/ssl/wpstack.crt"));
}

#[test]
fn test_nginx_requires_domain() {
    let err = render(&read("nginx/default.conf.template"), &Variables::new()).unwrap_err();
    assert!(err.to_string().contains("DOMAIN_NAME"));
}

#[tokio::test]
async fn test_wp_config_from_secret_files() {
    let tmp = TempDir::new().unwrap();
    let vars = wp_vars(&tmp, "wppass456");

    let dst = tmp.path().join("www/wp-config.php");
    render_file(
        &deploy_dir().join("wordpress/wp-config.php.template"),
        &dst,
        &vars,
    )
    .await
    .unwrap();

    let php = std::fs::read_to_string(&dst).unwrap();
    assert!(php.contains("define( 'DB_USER', 'wpuser' );"));
    assert!(php.contains("define( 'DB_PASSWORD', 'wppass456' );"));
    assert!(php.contains("define( 'DB_HOST', 'mariadb:3306' );"));
    assert!(php.contains("'https://example.test'"));
    assert!(php.contains("$table_prefix = 'wp_';"));
    assert!(php.contains("$_SERVER['HTTPS'] = 'on';"));
    assert!(php.contains("define( 'ABSPATH', '/var/www/html/' );"));
}

#[test]
fn test_wp_config_quotes_and_backslashes_stay_inside_literal() {
    let tmp = TempDir::new().unwrap();
    let vars = wp_vars(&tmp, r"it's-a-\pass\");

    let php = render(&read("wordpress/wp-config.php.template"), &vars).unwrap();

    let line = php.lines().find(|l| l.contains("'DB_PASSWORD'")).unwrap();
    assert_eq!(line, r"define( 'DB_PASSWORD', 'it\'s-a-\\pass\\' );");
    assert_eq!(php_literal_value(line, "'DB_PASSWORD', "), r"it's-a-\pass\");
}

#[test]
fn test_wp_config_rendered_outside_shared_volume() {
    // The application volume is mounted into nginx; the rendered config
    // carrying the credentials must land above it.
    let dockerfile = read("wordpress/Dockerfile");
    assert!(dockerfile.contains("wp-config.php.template:/var/www/wp-config.php\""));
    assert!(!dockerfile.contains(":/var/www/html/wp-config.php"));
    assert!(read("wordpress/prepare.sh").contains("rm -f /var/www/html/wp-config.php"));

    let compose = read("docker-compose.yml");
    assert!(compose.contains("wordpress:/var/www/html:ro"));
}

fn wp_vars(tmp: &TempDir, password: &str) -> Variables {
    let user_file = tmp.path().join("db_user");
    let password_file = tmp.path().join("db_password");
    std::fs::write(&user_file, "wpuser\n").unwrap();
    std::fs::write(&password_file, format!("{password}\n")).unwrap();

    let env = [
        ("DOMAIN_NAME", "example.test".to_string()),
        ("WORDPRESS_DB_HOST", "mariadb:3306".to_string()),
        ("WORDPRESS_DB_NAME", "wordpress".to_string()),
        ("WORDPRESS_DB_USER_FILE", user_file.display().to_string()),
        (
            "WORDPRESS_DB_PASSWORD_FILE",
            password_file.display().to_string(),
        ),
    ];
    // The environment itself only ever holds paths.
    assert!(env.iter().all(|(_, v)| !v.contains(password)));

    Variables::from_pairs(env.iter().map(|(k, v)| (k.to_string(), v.clone()))).unwrap()
}

/// Decode the single-quoted PHP literal following `after` on `line`, the
/// way PHP reads it. Panics if the literal is not closed exactly once.
fn php_literal_value(line: &str, after: &str) -> String {
    let start = line.find(after).unwrap() + after.len();
    let mut chars = line[start..].chars();
    assert_eq!(chars.next(), Some('\''));

    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(c @ ('\\' | '\'')) => value.push(c),
                Some(c) => {
                    value.push('\\');
                    value.push(c);
                }
                None => panic!("unterminated literal"),
            },
            Some('\'') => break,
            Some(c) => value.push(c),
            None => panic!("unterminated literal"),
        }
    }
    assert_eq!(chars.as_str(), " );");
    value
}

// ============================================================================
// Image builds
// ============================================================================

fn parse_version(v: &str) -> (u32, u32) {
    let mut parts = v.split('.').map(|p| p.parse::<u32>().unwrap());
    (parts.next().unwrap(), parts.next().unwrap())
}

#[test]
fn test_builder_images_meet_rust_version() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    let manifest = std::fs::read_to_string(root.join("Cargo.toml")).unwrap();
    let required = manifest
        .lines()
        .find_map(|l| l.strip_prefix("rust-version = \""))
        .map(|v| parse_version(v.trim_end_matches('"')))
        .unwrap();
    assert_eq!(env!("CARGO_PKG_RUST_VERSION"), format!("{}.{}", required.0, required.1));

    for service in ["mariadb", "nginx", "wordpress"] {
        let dockerfile = read(&format!("{service}/Dockerfile"));
        let image = dockerfile
            .lines()
            .find_map(|l| l.strip_prefix("FROM rust:"))
            .unwrap_or_else(|| panic!("{service} has no rust builder stage"));
        let tag = image.split('-').next().unwrap();
        assert!(
            parse_version(tag) >= required,
            "{service} builds with rust {tag}, workspace needs {}.{}",
            required.0,
            required.1
        );
    }
}
