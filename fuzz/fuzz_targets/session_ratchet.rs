// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use p2panda_ratchet::crypto::x25519::PublicKey;
use p2panda_ratchet::test_utils::{Members, establish_session};
use p2panda_ratchet::{Rng, RatchetMessage, Session};

/// Max. number of messages in a member's inbox.
const INBOX_CAPACITY: usize = 128;

/// Assertable ratchet message.
struct Message {
    /// Expected message in plaintext.
    expected: Vec<u8>,

    /// Encrypted message.
    ciphertext: RatchetMessage,
}

fn send(session: &mut Session, inbox: &mut VecDeque<Message>, len: usize, rng: &Rng) {
    let expected = rng.random_vec(len).unwrap();
    let ciphertext = session.send(&expected, rng).unwrap();
    inbox.push_back(Message {
        expected,
        ciphertext,
    });
}

fn receive(session: &mut Session, inbox: &mut VecDeque<Message>) {
    let Some(message) = inbox.pop_front() else {
        return;
    };
    let received = session.receive(&message.ciphertext).unwrap();
    assert_eq!(message.expected, received);
}

fn tamper(session: &mut Session, inbox: &VecDeque<Message>, rng: &Rng) {
    let Some(message) = inbox.front() else {
        return;
    };
    let [field, position] = rng.random_array::<2>().unwrap();
    let position = usize::from(position);

    // Flip a single bit in either the ratchet key, the nonce or the ciphertext.
    let mut ciphertext = message.ciphertext.clone();
    match field % 3 {
        0 => {
            let mut ratchet_key = ciphertext.ratchet_key.to_bytes();
            ratchet_key[position / 8] ^= 1 << (position % 8);
            ciphertext.ratchet_key = PublicKey::from_bytes(ratchet_key);
        }
        1 => {
            let bit = position % (ciphertext.nonce.len() * 8);
            ciphertext.nonce[bit / 8] ^= 1 << (bit % 8);
        }
        _ => {
            let bit = position % (ciphertext.ciphertext.len() * 8);
            ciphertext.ciphertext[bit / 8] ^= 1 << (bit % 8);
        }
    }

    let before = session.clone();
    assert!(session.receive(&ciphertext).is_err());
    assert_eq!(before, *session);
}

// Establish a session between Alice and Bob and randomly choose who sends or reads a message.
// Both share one root chain, so a member only sends after they have read all messages in their
// inbox. Messages with flipped bits get rejected without touching the session.
fuzz_target!(|args: ([u8; 32], &[u8])| {
    let (seed, actions) = args;

    let rng = Rng::from_seed(seed);

    let Members {
        mut alice_session,
        mut bob_session,
        ..
    } = establish_session(&rng);

    let mut to_alice_inbox = VecDeque::<Message>::with_capacity(INBOX_CAPACITY);
    let mut to_bob_inbox = VecDeque::<Message>::with_capacity(INBOX_CAPACITY);

    for action in actions {
        match action % 6 {
            0 => {
                if !to_alice_inbox.is_empty() || to_bob_inbox.len() >= INBOX_CAPACITY {
                    continue;
                }

                // Alice sends a random message of varying length to Bob.
                send(
                    &mut alice_session,
                    &mut to_bob_inbox,
                    usize::from(*action),
                    &rng,
                );
            }
            1 => {
                if !to_bob_inbox.is_empty() || to_alice_inbox.len() >= INBOX_CAPACITY {
                    continue;
                }

                // Bob sends a random message of varying length to Alice.
                send(
                    &mut bob_session,
                    &mut to_alice_inbox,
                    usize::from(*action),
                    &rng,
                );
            }
            2 => {
                // Alice reads one message in their inbox if there is anything.
                receive(&mut alice_session, &mut to_alice_inbox);
            }
            3 => {
                // Bob reads one message in their inbox if there is anything.
                receive(&mut bob_session, &mut to_bob_inbox);
            }
            4 => {
                // Alice receives a corrupted copy of their next message.
                tamper(&mut alice_session, &to_alice_inbox, &rng);
            }
            _ => {
                // Bob receives a corrupted copy of their next message.
                tamper(&mut bob_session, &to_bob_inbox, &rng);
            }
        }
    }

    // Drain all inboxes, everything left needs to decrypt as well.
    while !to_alice_inbox.is_empty() {
        receive(&mut alice_session, &mut to_alice_inbox);
    }
    while !to_bob_inbox.is_empty() {
        receive(&mut bob_session, &mut to_bob_inbox);
    }
});
