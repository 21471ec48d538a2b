//! Registry behavior under concurrent writers.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{youtube_formats, TestEnvironment};
use pretty_assertions::assert_eq;
use vidrelay::core::types::ProviderKind;
use vidrelay::storage::registry::{self, ChannelPatch, NewVideo};

fn new_video(url: &str) -> NewVideo {
    NewVideo {
        provider: ProviderKind::TikTok,
        provider_video_id: "7300".to_string(),
        title: "dance".to_string(),
        author: None,
        url: url.to_string(),
        channel_id: "tiktok:dancer".to_string(),
        duration_secs: Some(15),
        upload_date: None,
        thumbnail: None,
    }
}

#[test]
fn test_concurrent_first_sight_creates_one_video() {
    let env = TestEnvironment::new();
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let results: Vec<(i64, bool)> = (0..workers)
        .map(|_| {
            let pool = env.pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let (video, is_new) =
                    registry::resolve_or_create_video(&pool, new_video("https://www.tiktok.com/@dancer/video/7300"))
                        .unwrap();
                (video.id, is_new)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let first_id = results[0].0;
    assert!(results.iter().all(|(id, _)| *id == first_id));
    assert_eq!(results.iter().filter(|(_, is_new)| *is_new).count(), 1);
}

#[test]
fn test_concurrent_register_formats_is_idempotent() {
    let env = TestEnvironment::new();
    let (video, _) = env.seed_video(ProviderKind::YouTube, "https://youtu.be/x1", &[]);
    let barrier = Arc::new(Barrier::new(4));

    let inserted: usize = (0..4)
        .map(|_| {
            let pool = env.pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry::register_formats(&pool, video.id, &youtube_formats()).unwrap()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();

    assert_eq!(inserted, 3);
    let formats = registry::list_formats(&env.pool, video.id).unwrap();
    let ids: Vec<&str> = formats.iter().map(|f| f.format_id.as_str()).collect();
    assert_eq!(ids, vec!["140", "18", "137"]);
}

#[test]
fn test_concurrent_record_file_keeps_one_handle() {
    let env = TestEnvironment::new();
    let (video, infos) = env.seed_video(ProviderKind::YouTube, "https://youtu.be/x2", &youtube_formats());
    let info_id = infos[0].id;
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<String> = (0..4)
        .map(|n| {
            let pool = env.pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry::record_file(&pool, video.id, info_id, &format!("h{}", n))
                    .unwrap()
                    .handle
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert!(handles.iter().all(|h| *h == handles[0]));
    let stored = registry::find_file(&env.pool, info_id).unwrap().unwrap();
    assert_eq!(stored.handle, handles[0]);
    assert!(registry::get_format_by_id(&env.pool, info_id).unwrap().unwrap().materialized);
}

#[test]
fn test_channel_upsert_never_clears_fields() {
    let env = TestEnvironment::new();
    registry::create_or_update_channel(
        &env.pool,
        ChannelPatch {
            name: Some("Band".to_string()),
            subscriber_count: Some(10),
            ..ChannelPatch::new("UC9")
        },
    )
    .unwrap();
    registry::create_or_update_channel(
        &env.pool,
        ChannelPatch {
            avatar: Some("AgAC-avatar".to_string()),
            ..ChannelPatch::new("UC9")
        },
    )
    .unwrap();

    let channel = registry::get_channel(&env.pool, "UC9").unwrap();
    assert_eq!(channel.name.as_deref(), Some("Band"));
    assert_eq!(channel.subscriber_count, Some(10));
    assert_eq!(channel.avatar.as_deref(), Some("AgAC-avatar"));
}
