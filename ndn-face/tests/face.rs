//! End-to-end face tests over the dummy transport and virtual time.

use ndn_face::dummy::{advance_clocks, DummyFace, DummyFaceOptions};
use ndn_face::{
    CommandOptions, Data, DigestSigner, Error, Interest, InterestFilter, Nack, NackReason, Name,
    PrefixAnnouncement, Signer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn make_interest(uri: &str, can_be_prefix: bool, lifetime_ms: u64) -> Interest {
    Interest::new(uri)
        .with_can_be_prefix(can_be_prefix)
        .with_lifetime(Duration::from_millis(lifetime_ms))
}

fn make_data(uri: &str) -> Data {
    let mut data = Data::new(uri, "");
    DigestSigner.sign_data(&mut data).unwrap();
    data
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &Arc<AtomicUsize>) {
    counter.fetch_add(1, Ordering::SeqCst);
}

async fn advance(ms: u64, times: u32) {
    advance_clocks(Duration::from_millis(ms), times).await;
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/* ---------------------------------------------------------------- *
 * expressInterest
 * ---------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn reply_data() {
    init_logging();
    let face = DummyFace::new();
    let n_data = counter();
    let unexpected = counter();

    {
        let n_data = Arc::clone(&n_data);
        let bad_nack = Arc::clone(&unexpected);
        let bad_timeout = Arc::clone(&unexpected);
        face.express_interest(
            make_interest("/Hello/World", true, 50),
            Some(Box::new(move |interest, data| {
                assert!(interest.name().is_prefix_of(data.name()));
                assert_eq!(interest.name().to_string(), "/Hello/World");
                assert_eq!(data.name().to_string(), "/Hello/World/a");
                bump(&n_data);
            })),
            Some(Box::new(move |_, _| bump(&bad_nack))),
            Some(Box::new(move |_| bump(&bad_timeout))),
        )
        .unwrap();
    }

    advance(40, 1).await;

    face.receive_data(&make_data("/Bye/World/a"));
    face.receive_data(&make_data("/Hello/World/a"));

    advance(50, 2).await;

    assert_eq!(count(&n_data), 1);
    assert_eq!(count(&unexpected), 0);
    assert_eq!(face.sent_interests().len(), 1);
    assert_eq!(face.sent_data().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn multiple_data() {
    let face = DummyFace::new();
    let n_data = counter();

    for uri in ["/Hello/World", "/Hello/World/a"] {
        let n_data = Arc::clone(&n_data);
        face.express_interest(
            make_interest(uri, true, 50),
            Some(Box::new(move |_, _| bump(&n_data))),
            None,
            None,
        )
        .unwrap();
    }

    advance(40, 1).await;
    face.receive_data(&make_data("/Hello/World/a/b"));
    advance(50, 2).await;

    assert_eq!(count(&n_data), 2);
    assert_eq!(face.sent_interests().len(), 2);
    assert_eq!(face.sent_data().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout() {
    let face = DummyFace::new();
    let n_timeouts = counter();
    let unexpected = counter();

    {
        let n_timeouts = Arc::clone(&n_timeouts);
        let bad_data = Arc::clone(&unexpected);
        let bad_nack = Arc::clone(&unexpected);
        face.express_interest(
            make_interest("/Hello/World", false, 50),
            Some(Box::new(move |_, _| bump(&bad_data))),
            Some(Box::new(move |_, _| bump(&bad_nack))),
            Some(Box::new(move |interest| {
                assert_eq!(interest.name().to_string(), "/Hello/World");
                bump(&n_timeouts);
            })),
        )
        .unwrap();
    }

    advance(200, 5).await;

    assert_eq!(count(&n_timeouts), 1);
    assert_eq!(count(&unexpected), 0);
    assert_eq!(face.sent_interests().len(), 1);
    assert_eq!(face.sent_data().len(), 0);
    assert_eq!(face.sent_nacks().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_callbacks() {
    let face = DummyFace::new();

    face.express_interest(make_interest("/Hello/World", true, 50), None, None, None)
        .unwrap();
    advance(1, 1).await;
    face.receive_data(&make_data("/Hello/World/a"));
    advance(1, 1).await;

    face.express_interest(make_interest("/Hello/World", false, 50), None, None, None)
        .unwrap();
    advance(200, 5).await;

    let interest = make_interest("/Hello/World", false, 50).with_nonce(99);
    face.express_interest(interest.clone(), None, None, None)
        .unwrap();
    advance(1, 1).await;
    face.receive_nack(&Nack::new(interest, NackReason::Duplicate));
    advance(1, 1).await;
}

#[tokio::test(start_paused = true)]
async fn reply_nack() {
    let face = DummyFace::new();
    let n_nacks = counter();
    let unexpected = counter();

    {
        let n_nacks = Arc::clone(&n_nacks);
        let bad_data = Arc::clone(&unexpected);
        let bad_timeout = Arc::clone(&unexpected);
        face.express_interest(
            make_interest("/Hello/World", false, 50),
            Some(Box::new(move |_, _| bump(&bad_data))),
            Some(Box::new(move |interest, nack| {
                assert_eq!(interest.name().to_string(), "/Hello/World");
                assert_eq!(nack.reason(), NackReason::Duplicate);
                bump(&n_nacks);
            })),
            Some(Box::new(move |_| bump(&bad_timeout))),
        )
        .unwrap();
    }

    advance(40, 1).await;

    let sent = face.sent_interests();
    face.receive_nack(&Nack::new(sent[0].clone(), NackReason::Duplicate));

    advance(50, 2).await;

    assert_eq!(count(&n_nacks), 1);
    assert_eq!(count(&unexpected), 0);
    assert_eq!(face.sent_interests().len(), 1);
}

// A Nack correlates to a pending Interest by name plus nonce: with
// different nonces on the same name, only the matching entry is nacked.
#[tokio::test(start_paused = true)]
async fn nack_matches_by_nonce() {
    let face = DummyFace::new();
    let n_nacks_first = counter();
    let n_nacks_second = counter();
    let n_timeouts_first = counter();

    {
        let n_nacks_first = Arc::clone(&n_nacks_first);
        let n_timeouts_first = Arc::clone(&n_timeouts_first);
        face.express_interest(
            make_interest("/Hello/World", false, 50).with_nonce(1),
            None,
            Some(Box::new(move |_, _| bump(&n_nacks_first))),
            Some(Box::new(move |_| bump(&n_timeouts_first))),
        )
        .unwrap();
    }
    {
        let n_nacks_second = Arc::clone(&n_nacks_second);
        face.express_interest(
            make_interest("/Hello/World", false, 50).with_nonce(2),
            None,
            Some(Box::new(move |_, _| bump(&n_nacks_second))),
            None,
        )
        .unwrap();
    }

    advance(10, 1).await;
    face.receive_nack(&Nack::new(
        make_interest("/Hello/World", false, 50).with_nonce(2),
        NackReason::Duplicate,
    ));
    advance(10, 1).await;

    assert_eq!(count(&n_nacks_first), 0);
    assert_eq!(count(&n_nacks_second), 1);

    // the unmatched entry still runs to its timeout
    advance(50, 2).await;
    assert_eq!(count(&n_timeouts_first), 1);
}

#[tokio::test(start_paused = true)]
async fn put_data_from_data_callback() {
    let face = DummyFace::new();

    {
        let producer = face.face().clone();
        face.express_interest(
            make_interest("/localhost/notification/1", false, 4000),
            Some(Box::new(move |_, _| {
                producer
                    .put(make_data("/chronosync/sampleDigest/1"))
                    .unwrap();
            })),
            None,
            None,
        )
        .unwrap();
    }
    advance(10, 1).await;
    assert_eq!(
        face.sent_interests().last().unwrap().name().to_string(),
        "/localhost/notification/1"
    );

    face.receive_interest(&make_interest("/chronosync/sampleDigest", true, 4000));
    advance(10, 1).await;

    face.put(make_data("/localhost/notification/1")).unwrap();
    advance(10, 1).await;
    assert_eq!(
        face.sent_data().last().unwrap().name().to_string(),
        "/chronosync/sampleDigest/1"
    );
}

#[tokio::test(start_paused = true)]
async fn destroy_with_pending_interest() {
    let face = DummyFace::new();
    face.express_interest(make_interest("/Hello/World", false, 50), None, None, None)
        .unwrap();
    advance(10, 1).await;
    drop(face);
    advance(50, 2).await;
}

#[tokio::test(start_paused = true)]
async fn pending_interest_handle() {
    let face = DummyFace::new();
    let unexpected = counter();

    let handle = {
        let bad_data = Arc::clone(&unexpected);
        let bad_nack = Arc::clone(&unexpected);
        let bad_timeout = Arc::clone(&unexpected);
        face.express_interest(
            make_interest("/Hello/World", true, 50),
            Some(Box::new(move |_, _| bump(&bad_data))),
            Some(Box::new(move |_, _| bump(&bad_nack))),
            Some(Box::new(move |_| bump(&bad_timeout))),
        )
        .unwrap()
    };
    advance(1, 1).await;
    handle.cancel();
    handle.cancel(); // duplicate cancel is a no-op
    advance(1, 1).await;
    face.receive_data(&make_data("/Hello/World/a"));
    advance(200, 5).await;
    assert_eq!(count(&unexpected), 0);

    // cancel after the face is destroyed
    let face2 = DummyFace::new();
    let handle2 = face2
        .express_interest(make_interest("/Hello/World", true, 50), None, None, None)
        .unwrap();
    advance(1, 1).await;
    drop(face2);
    advance(1, 1).await;
    handle2.cancel();
    advance(1, 1).await;
}

#[tokio::test(start_paused = true)]
async fn remove_all_pending_interests() {
    let face = DummyFace::new();
    let unexpected = counter();

    for uri in ["/Hello/World/0", "/Hello/World/1"] {
        let bad_data = Arc::clone(&unexpected);
        let bad_nack = Arc::clone(&unexpected);
        let bad_timeout = Arc::clone(&unexpected);
        face.express_interest(
            make_interest(uri, false, 50),
            Some(Box::new(move |_, _| bump(&bad_data))),
            Some(Box::new(move |_, _| bump(&bad_nack))),
            Some(Box::new(move |_| bump(&bad_timeout))),
        )
        .unwrap();
    }

    advance(10, 1).await;
    assert_eq!(face.n_pending_interests(), 2);

    face.remove_all_pending_interests();
    advance(10, 1).await;
    assert_eq!(face.n_pending_interests(), 0);

    face.receive_data(&make_data("/Hello/World/0"));
    face.receive_data(&make_data("/Hello/World/1"));
    advance(200, 5).await;
    assert_eq!(count(&unexpected), 0);
}

#[tokio::test(start_paused = true)]
async fn oversized_outgoing_packets_are_rejected() {
    let face = DummyFace::new();

    let mut interest = make_interest("/oversize", false, 50);
    interest.app_parameters = Some(bytes::Bytes::from(vec![0u8; 9000]));
    let err = face
        .express_interest(interest, None, None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(ndn_face_core::Error::OversizedPacket { .. })
    ));

    let data = Data::new("/oversize", bytes::Bytes::from(vec![0u8; 9000]));
    assert!(matches!(
        face.put(data),
        Err(Error::Core(ndn_face_core::Error::OversizedPacket { .. }))
    ));

    advance(1, 1).await;
    assert_eq!(face.sent_interests().len(), 0);
    assert_eq!(face.sent_data().len(), 0);
}

/* ---------------------------------------------------------------- *
 * Producer
 * ---------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn put_data_carries_lp_fields() {
    let face = DummyFace::new();
    assert_eq!(face.sent_data().len(), 0);

    let data = make_data("/4g7xxcuEow/KFvK5Kf2m");
    face.put(data.clone()).unwrap();

    let mut tagged = data;
    tagged.tags.cache_policy = Some(ndn_face::CachePolicy::NoCache);
    tagged.tags.congestion_mark = Some(1);
    face.put(tagged).unwrap();

    advance(10, 1).await;
    let sent = face.sent_data();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].tags.cache_policy, None);
    assert_eq!(sent[0].tags.congestion_mark, None);
    assert_eq!(sent[1].tags.cache_policy, Some(ndn_face::CachePolicy::NoCache));
    assert_eq!(sent[1].tags.congestion_mark, Some(1));
}

#[tokio::test(start_paused = true)]
async fn put_data_loopback() {
    let face = DummyFace::new();
    let n_filter1 = counter();
    let n_filter2 = counter();
    let n_data = counter();

    {
        // first filter allows loopback and should see the Interest,
        // but does not respond right away
        let n_filter1 = Arc::clone(&n_filter1);
        face.set_interest_filter(
            "/",
            Some(Box::new(move |_, _| bump(&n_filter1))),
        );
    }
    {
        // second filter disallows loopback
        let n_filter2 = Arc::clone(&n_filter2);
        face.set_interest_filter(
            InterestFilter::new("/").allow_loopback(false),
            Some(Box::new(move |_, _| bump(&n_filter2))),
        );
    }

    {
        let n_data = Arc::clone(&n_data);
        face.express_interest(
            make_interest("/A", true, 4000),
            Some(Box::new(move |_, _| bump(&n_data))),
            None,
            None,
        )
        .unwrap();
    }
    advance(1, 1).await;
    assert_eq!(count(&n_filter1), 1); // Interest looped back
    assert_eq!(count(&n_filter2), 0); // loopback disallowed
    assert_eq!(face.sent_interests().len(), 1); // still sent to the forwarder
    assert_eq!(count(&n_data), 0); // waiting for Data

    face.put(make_data("/A/B")).unwrap();
    advance(1, 1).await;
    assert_eq!(count(&n_data), 1);
    assert_eq!(face.sent_data().len(), 0); // consumed locally, not spilled

    // a transport-delivered Interest reaches both filters
    face.receive_interest(&make_interest("/C", false, 4000));
    advance(1, 1).await;
    assert_eq!(count(&n_filter1), 2);
    assert_eq!(count(&n_filter2), 1);
}

#[tokio::test(start_paused = true)]
async fn put_multiple_data() {
    let face = DummyFace::new();
    let n_filter1 = counter();
    let n_filter2 = counter();

    {
        let n_filter1 = Arc::clone(&n_filter1);
        let producer = face.face().clone();
        face.set_interest_filter(
            "/",
            Some(Box::new(move |_, _| {
                bump(&n_filter1);
                // respond right away from the first destination
                producer.put(make_data("/A/B")).unwrap();
            })),
        );
    }
    {
        let n_filter2 = Arc::clone(&n_filter2);
        face.set_interest_filter("/", Some(Box::new(move |_, _| bump(&n_filter2))));
    }
    advance(10, 1).await;

    face.receive_interest(&make_interest("/A", true, 4000).with_nonce(1));
    advance(10, 1).await;
    assert_eq!(count(&n_filter1), 1);
    assert_eq!(count(&n_filter2), 1);
    let sent = face.sent_data();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name().to_string(), "/A/B");
}

#[tokio::test(start_paused = true)]
async fn put_nack() {
    let face = DummyFace::new();
    // one Interest destination so the face can accept Nacks
    face.set_interest_filter("/", None);
    advance(10, 1).await;

    assert_eq!(face.sent_nacks().len(), 0);

    // an unsolicited Nack is not sent
    face.put_nack(Nack::new(
        make_interest("/unsolicited", false, 4000).with_nonce(18_645_250),
        NackReason::NoRoute,
    ))
    .unwrap();
    advance(10, 1).await;
    assert_eq!(face.sent_nacks().len(), 0);

    let interest1 = make_interest("/Hello/World", false, 4000).with_nonce(14_247_162);
    face.receive_interest(&interest1);
    let interest2 = make_interest("/another/prefix", false, 4000).with_nonce(92_203_002);
    face.receive_interest(&interest2);
    advance(10, 1).await;

    face.put_nack(Nack::new(interest1, NackReason::Duplicate))
        .unwrap();
    advance(10, 1).await;
    let sent = face.sent_nacks();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reason(), NackReason::Duplicate);
    assert_eq!(sent[0].tags.congestion_mark, None);

    let mut nack = Nack::new(interest2, NackReason::NoRoute);
    nack.tags.congestion_mark = Some(1);
    face.put_nack(nack).unwrap();
    advance(10, 1).await;
    let sent = face.sent_nacks();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].reason(), NackReason::NoRoute);
    assert_eq!(sent[1].tags.congestion_mark, Some(1));
}

#[tokio::test(start_paused = true)]
async fn put_multiple_nack() {
    let face = DummyFace::new();
    let n_filter1 = counter();
    let n_filter2 = counter();

    {
        let n_filter1 = Arc::clone(&n_filter1);
        let nacker = face.face().clone();
        face.set_interest_filter(
            "/",
            Some(Box::new(move |_, interest: &Interest| {
                bump(&n_filter1);
                // nack right away from the first destination
                nacker
                    .put_nack(Nack::new(interest.clone(), NackReason::Congestion))
                    .unwrap();
            })),
        );
    }
    {
        let n_filter2 = Arc::clone(&n_filter2);
        face.set_interest_filter("/", Some(Box::new(move |_, _| bump(&n_filter2))));
    }
    advance(10, 1).await;

    let interest = make_interest("/A", false, 4000).with_nonce(14_333_271);
    face.receive_interest(&interest);
    advance(10, 1).await;
    assert_eq!(count(&n_filter1), 1);
    assert_eq!(count(&n_filter2), 1);

    // one destination nacked, the other is still pending
    assert_eq!(face.sent_nacks().len(), 0);

    face.put_nack(Nack::new(interest.clone(), NackReason::NoRoute))
        .unwrap();
    advance(10, 1).await;
    let sent = face.sent_nacks();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reason(), NackReason::Congestion); // least severe

    // additional Nacks for the consumed entry are ignored
    face.put_nack(Nack::new(interest, NackReason::Duplicate))
        .unwrap();
    advance(10, 1).await;
    assert_eq!(face.sent_nacks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn put_multiple_nack_loopback() {
    let face = DummyFace::new();
    let n_filter1 = counter();
    let n_filter2 = counter();
    let n_nacks = counter();

    {
        let n_filter1 = Arc::clone(&n_filter1);
        let nacker = face.face().clone();
        face.set_interest_filter(
            "/",
            Some(Box::new(move |_, interest: &Interest| {
                bump(&n_filter1);
                nacker
                    .put_nack(Nack::new(interest.clone(), NackReason::Congestion))
                    .unwrap();
            })),
        );
    }
    {
        let n_filter2 = Arc::clone(&n_filter2);
        face.set_interest_filter(
            InterestFilter::new("/").allow_loopback(false),
            Some(Box::new(move |_, _| bump(&n_filter2))),
        );
    }

    let interest = make_interest("/A", false, 4000).with_nonce(28_395_852);
    {
        let n_nacks = Arc::clone(&n_nacks);
        face.express_interest(
            interest.clone(),
            None,
            Some(Box::new(move |_, nack: &Nack| {
                assert_eq!(nack.reason(), NackReason::Congestion);
                bump(&n_nacks);
            })),
            None,
        )
        .unwrap();
    }
    advance(1, 1).await;
    assert_eq!(count(&n_filter1), 1); // Interest looped back
    assert_eq!(count(&n_filter2), 0);
    assert_eq!(face.sent_interests().len(), 1); // Interest sent to the forwarder
    assert_eq!(count(&n_nacks), 0); // waiting for the forwarder

    face.receive_nack(&Nack::new(interest, NackReason::NoRoute));
    advance(1, 1).await;
    assert_eq!(count(&n_nacks), 1);
}

/* ---------------------------------------------------------------- *
 * Prefix registration
 * ---------------------------------------------------------------- */

async fn run_prefix_reg(face: &DummyFace, prefix: &str) -> Option<bool> {
    let outcome = Arc::new(Mutex::new(None));
    let ok = Arc::clone(&outcome);
    let fail = Arc::clone(&outcome);
    face.register_prefix(
        Name::from_uri(prefix).unwrap(),
        0,
        CommandOptions::default(),
        None,
        Some(Box::new(move |_| {
            *ok.lock().unwrap() = Some(true);
        })),
        Some(Box::new(move |_, _| {
            *fail.lock().unwrap() = Some(false);
        })),
    );
    advance(1, 4).await;
    let result = *outcome.lock().unwrap();
    result
}

#[tokio::test(start_paused = true)]
async fn register_prefix_success() {
    let face = DummyFace::new();
    assert_eq!(run_prefix_reg(&face, "/Hello/World").await, Some(true));

    let sent = face.sent_interests();
    assert_eq!(sent.len(), 1);
    assert!(Name::from_uri("/localhost/nfd/rib/register")
        .unwrap()
        .is_prefix_of(sent[0].name()));
}

#[tokio::test(start_paused = true)]
async fn register_prefix_failure_without_reply() {
    let face = DummyFace::with_options(DummyFaceOptions {
        enable_registration_reply: false,
        ..DummyFaceOptions::default()
    });

    let n_failures = counter();
    let unexpected = counter();
    {
        let n_failures = Arc::clone(&n_failures);
        let bad_success = Arc::clone(&unexpected);
        face.register_prefix(
            "/Hello/World".into(),
            0,
            CommandOptions::default(),
            None,
            Some(Box::new(move |_| bump(&bad_success))),
            Some(Box::new(move |prefix, _text| {
                assert_eq!(prefix.to_string(), "/Hello/World");
                bump(&n_failures);
            })),
        );
    }

    // the command times out after its 10 s default
    advance(5000, 20).await;
    assert_eq!(count(&n_failures), 1);
    assert_eq!(count(&unexpected), 0);

    // nothing was registered: unregistration is refused locally
    let n_unreg_failures = counter();
    let sent_before = face.sent_interests().len();
    let handle = face.register_prefix(
        "/Hello/World".into(),
        0,
        CommandOptions::default(),
        None,
        None,
        Some(Box::new(|_, _| {})),
    );
    advance(5000, 20).await;
    {
        let n_unreg_failures = Arc::clone(&n_unreg_failures);
        handle.unregister(
            None,
            Some(Box::new(move |text: &str| {
                assert!(text.starts_with("Unrecognized"));
                bump(&n_unreg_failures);
            })),
        );
    }
    advance(1, 2).await;
    assert_eq!(count(&n_unreg_failures), 1);
    // the failed unregistration sent no command
    assert_eq!(face.sent_interests().len(), sent_before + 1);
}

#[tokio::test(start_paused = true)]
async fn register_prefix_handle() {
    init_logging();
    let face = DummyFace::new();

    // register, then unregister
    let handle = {
        let outcome = Arc::new(Mutex::new(None));
        let ok = Arc::clone(&outcome);
        let handle = face.register_prefix(
            "/Hello/World".into(),
            0,
            CommandOptions::default(),
            None,
            Some(Box::new(move |_| {
                *ok.lock().unwrap() = Some(true);
            })),
            None,
        );
        advance(1, 4).await;
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        handle
    };

    let n_unreg = counter();
    {
        let n_unreg = Arc::clone(&n_unreg);
        handle.unregister(Some(Box::new(move || bump(&n_unreg))), None);
    }
    advance(1, 4).await;
    assert_eq!(count(&n_unreg), 1);

    // cancel after unregister is a no-op
    handle.cancel();
    advance(1, 2).await;

    // unregister after cancel fails with an "Unrecognized" message
    let handle = {
        let handle = face.register_prefix(
            "/Hello/World".into(),
            0,
            CommandOptions::default(),
            None,
            None,
            None,
        );
        advance(1, 4).await;
        handle
    };
    handle.cancel();
    advance(1, 4).await;

    let n_failures = counter();
    {
        let n_failures = Arc::clone(&n_failures);
        handle.unregister(
            None,
            Some(Box::new(move |text: &str| {
                assert!(text.starts_with("Unrecognized"));
                bump(&n_failures);
            })),
        );
    }
    advance(1, 2).await;
    assert_eq!(count(&n_failures), 1);

    // cancel and unregister after the face is destroyed
    let face2 = DummyFace::new();
    let handle2 = face2.register_prefix(
        "/Hello/World/2".into(),
        0,
        CommandOptions::default(),
        None,
        None,
        None,
    );
    advance(1, 2).await;
    drop(face2);
    advance(1, 2).await;
    handle2.cancel();
    advance(1, 2).await;

    let n_failures = counter();
    {
        let n_failures = Arc::clone(&n_failures);
        handle2.unregister(
            None,
            Some(Box::new(move |text: &str| {
                assert!(text.starts_with("Unrecognized"));
                bump(&n_failures);
            })),
        );
    }
    assert_eq!(count(&n_failures), 1);
}

#[tokio::test(start_paused = true)]
async fn announce_prefix_handle() {
    let face = DummyFace::new();

    let outcome = Arc::new(Mutex::new(None));
    let handle = {
        let ok = Arc::clone(&outcome);
        let fail = Arc::clone(&outcome);
        face.announce_prefix(
            PrefixAnnouncement::new("/Hello/World".into(), Duration::from_millis(1000)),
            CommandOptions::default(),
            Some(Box::new(move |_| {
                *ok.lock().unwrap() = Some(true);
            })),
            Some(Box::new(move |_, _| {
                *fail.lock().unwrap() = Some(false);
            })),
        )
    };
    advance(1, 4).await;
    assert_eq!(*outcome.lock().unwrap(), Some(true));

    let sent = face.sent_interests();
    assert_eq!(sent.len(), 1);
    assert!(Name::from_uri("/localhost/nfd/rib/announce")
        .unwrap()
        .is_prefix_of(sent[0].name()));

    let n_unreg = counter();
    {
        let n_unreg = Arc::clone(&n_unreg);
        handle.unregister(Some(Box::new(move || bump(&n_unreg))), None);
    }
    advance(1, 4).await;
    assert_eq!(count(&n_unreg), 1);
}

#[tokio::test(start_paused = true)]
async fn announce_prefix_failure_without_reply() {
    let face = DummyFace::with_options(DummyFaceOptions {
        enable_registration_reply: false,
        ..DummyFaceOptions::default()
    });

    let n_failures = counter();
    {
        let n_failures = Arc::clone(&n_failures);
        face.announce_prefix(
            PrefixAnnouncement::new("/Hello/World".into(), Duration::from_secs(10)),
            CommandOptions::default(),
            None,
            Some(Box::new(move |_, _| bump(&n_failures))),
        );
    }
    advance(5000, 20).await;
    assert_eq!(count(&n_failures), 1);
}

/* ---------------------------------------------------------------- *
 * Interest filters
 * ---------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn set_and_cancel_filter() {
    let face = DummyFace::new();
    let n_interests = counter();

    let handle = {
        let n_interests = Arc::clone(&n_interests);
        face.set_interest_filter(
            "/Hello/World",
            Some(Box::new(move |_, _| bump(&n_interests))),
        )
    };
    advance(25, 4).await;
    assert_eq!(count(&n_interests), 0);

    face.receive_interest(&make_interest("/Hello/World/%21", false, 4000));
    advance(25, 4).await;
    assert_eq!(count(&n_interests), 1);

    face.receive_interest(&make_interest("/Bye/World/%21", false, 4000));
    advance(100, 10).await;
    assert_eq!(count(&n_interests), 1);

    face.receive_interest(&make_interest("/Hello/World/%21/2", false, 4000));
    advance(25, 4).await;
    assert_eq!(count(&n_interests), 2);

    handle.cancel();
    advance(25, 4).await;

    face.receive_interest(&make_interest("/Hello/World/%21/3", false, 4000));
    advance(25, 4).await;
    assert_eq!(count(&n_interests), 2);

    // a plain filter never talks to the forwarder
    assert_eq!(face.sent_interests().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn similar_filters() {
    let face = DummyFace::new();
    let n1 = counter();
    let n2 = counter();
    let n3 = counter();

    {
        let n1 = Arc::clone(&n1);
        face.set_interest_filter("/Hello/World", Some(Box::new(move |_, _| bump(&n1))));
    }
    {
        let n2 = Arc::clone(&n2);
        face.set_interest_filter("/Hello", Some(Box::new(move |_, _| bump(&n2))));
    }
    {
        let n3 = Arc::clone(&n3);
        face.set_interest_filter(
            "/Los/Angeles/Lakers",
            Some(Box::new(move |_, _| bump(&n3))),
        );
    }
    advance(25, 4).await;

    face.receive_interest(&make_interest("/Hello/World/%21", false, 4000));
    advance(25, 4).await;

    assert_eq!(count(&n1), 1);
    assert_eq!(count(&n2), 1);
    assert_eq!(count(&n3), 0);
}

#[tokio::test(start_paused = true)]
async fn regex_filter() {
    let face = DummyFace::new();
    let n_interests = counter();

    {
        let n_interests = Arc::clone(&n_interests);
        face.set_interest_filter(
            InterestFilter::with_pattern("/Hello/World", "<><b><c>?"),
            Some(Box::new(move |_, _| bump(&n_interests))),
        );
    }
    advance(25, 4).await;

    face.receive_interest(&make_interest("/Hello/World/a", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 0);

    face.receive_interest(&make_interest("/Hello/World/a/b", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 1);

    face.receive_interest(&make_interest("/Hello/World/a/b/c", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 2);

    face.receive_interest(&make_interest("/Hello/World/a/b/d", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 2);
}

#[tokio::test(start_paused = true)]
async fn register_prefix_with_coupled_filter() {
    let face = DummyFace::new();
    let n_interests = counter();
    let n_success = counter();

    let handle = {
        let n_interests = Arc::clone(&n_interests);
        let n_success = Arc::clone(&n_success);
        face.register_prefix(
            "/Hello/World".into(),
            0,
            CommandOptions::default(),
            Some((
                InterestFilter::with_pattern("/Hello/World", "<><b><c>?"),
                Some(Box::new(move |_: &InterestFilter, _: &Interest| {
                    bump(&n_interests)
                })),
            )),
            Some(Box::new(move |_| bump(&n_success))),
            None,
        )
    };
    advance(25, 4).await;
    assert_eq!(count(&n_success), 1);

    face.receive_interest(&make_interest("/Hello/World/a", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 0);

    face.receive_interest(&make_interest("/Hello/World/a/b", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 1);

    // unregistering erases the coupled filter together with the prefix
    let n_unreg = counter();
    {
        let n_unreg = Arc::clone(&n_unreg);
        handle.unregister(Some(Box::new(move || bump(&n_unreg))), None);
    }
    advance(25, 4).await;
    assert_eq!(count(&n_unreg), 1);

    face.receive_interest(&make_interest("/Hello/World/a/b", false, 4000));
    advance(5, 2).await;
    assert_eq!(count(&n_interests), 1);
}

// A malformed pattern surfaces when an Interest reaches the filter; the
// face reports it and keeps dispatching.
#[tokio::test(start_paused = true)]
async fn malformed_filter_pattern_does_not_break_dispatch() {
    let face = DummyFace::new();
    let n_broken = counter();
    let n_interests = counter();

    {
        let n_broken = Arc::clone(&n_broken);
        face.set_interest_filter(
            InterestFilter::with_pattern("/Hello/World", "<><b"),
            Some(Box::new(move |_, _| bump(&n_broken))),
        );
    }
    advance(1, 2).await;

    face.receive_interest(&make_interest("/Hello/World/a/b", false, 4000));
    advance(1, 2).await;
    assert_eq!(count(&n_broken), 0);

    // the face keeps working for well-formed filters
    {
        let n_interests = Arc::clone(&n_interests);
        face.set_interest_filter("/Good", Some(Box::new(move |_, _| bump(&n_interests))));
    }
    advance(1, 2).await;
    face.receive_interest(&make_interest("/Good/morning", false, 4000));
    advance(1, 2).await;
    assert_eq!(count(&n_interests), 1);
}

/* ---------------------------------------------------------------- *
 * Broadcast link
 * ---------------------------------------------------------------- */

#[tokio::test(start_paused = true)]
async fn broadcast_link_exchanges_packets() {
    init_logging();
    let consumer = DummyFace::new();
    let producer = DummyFace::new();
    consumer.link_to(&producer).unwrap();

    {
        let responder = producer.face().clone();
        producer.set_interest_filter(
            "/A",
            Some(Box::new(move |_, _: &Interest| {
                responder.put(make_data("/A/1")).unwrap();
            })),
        );
    }
    advance(10, 2).await;

    let n_data = counter();
    {
        let n_data = Arc::clone(&n_data);
        consumer
            .express_interest(
                make_interest("/A", true, 1000),
                Some(Box::new(move |_, data| {
                    assert_eq!(data.name().to_string(), "/A/1");
                    bump(&n_data);
                })),
                None,
                None,
            )
            .unwrap();
    }
    advance(10, 4).await;
    assert_eq!(count(&n_data), 1);
}

#[tokio::test(start_paused = true)]
async fn broadcast_link_rejects_conflicting_groups() {
    let a = DummyFace::new();
    let b = DummyFace::new();
    let c = DummyFace::new();
    let d = DummyFace::new();

    a.link_to(&b).unwrap();
    c.link_to(&d).unwrap();
    a.link_to(&b).unwrap(); // same group again is fine

    assert!(matches!(a.link_to(&c), Err(Error::AlreadyLinked)));

    // after unlinking, c can join a's group
    c.unlink();
    a.link_to(&c).unwrap();
}
