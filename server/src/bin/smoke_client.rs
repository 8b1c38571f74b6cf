//! End-to-end smoke client: drives one full quiz round and a semantic
//! search against a running server over real UDP.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::Rng;
use shared::{Packet, SessionConfig, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to exercise
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

async fn recv(socket: &UdpSocket) -> Result<Packet, Box<dyn std::error::Error>> {
    let mut buf = [0u8; 4096];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(deserialize(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    // Create a two-player session
    send(
        &socket,
        args.server,
        &Packet::CreateSession {
            client_version: PROTOCOL_VERSION,
            config: SessionConfig::new(2, 4),
        },
    )
    .await?;

    let session_id = match recv(&socket).await? {
        Packet::SessionCreated { session_id } => session_id,
        other => return Err(format!("expected SessionCreated, got {:?}", other).into()),
    };
    println!("Created session {}", session_id);

    // Join both players from this socket. Joins are broadcast to every
    // roster member and both players share this address, so the n-th
    // join produces n copies here; drain them all.
    for (n, player) in ["alice", "bob"].iter().enumerate() {
        send(
            &socket,
            args.server,
            &Packet::JoinSession {
                session_id: session_id.clone(),
                player_id: player.to_string(),
            },
        )
        .await?;

        match recv(&socket).await? {
            Packet::SessionJoined { status, roster, .. } => {
                println!("{} joined; status {:?}, roster {:?}", player, status, roster);
            }
            other => return Err(format!("expected SessionJoined, got {:?}", other).into()),
        }
        for _ in 0..n {
            let _ = recv(&socket).await;
        }
    }

    // Start and grab the first question
    send(
        &socket,
        args.server,
        &Packet::StartSession {
            session_id: session_id.clone(),
        },
    )
    .await?;

    let question = match recv(&socket).await? {
        Packet::SessionStarted { question, .. } => question,
        other => return Err(format!("expected SessionStarted, got {:?}", other).into()),
    };
    println!("First question: {}", question.prompt);

    // The roster broadcast reaches this socket once per joined player;
    // drain the duplicate before submitting.
    let _ = recv(&socket).await;

    // Alice answers correctly, bob guesses
    let bob_answer = rand::thread_rng().gen_range(0..question.options.len());
    let submissions = [
        ("alice", question.correct_index),
        ("bob", bob_answer),
    ];

    for (player, answer_index) in submissions {
        send(
            &socket,
            args.server,
            &Packet::SubmitAnswer {
                session_id: session_id.clone(),
                player_id: player.to_string(),
                answer_index,
            },
        )
        .await?;

        match recv(&socket).await? {
            Packet::AnswerResult { correct, score } => {
                println!("{}: correct={} score={}", player, correct, score);
            }
            other => return Err(format!("expected AnswerResult, got {:?}", other).into()),
        }
    }

    // Finish up and run a search against the seeded catalog
    send(
        &socket,
        args.server,
        &Packet::CloseSession {
            session_id: session_id.clone(),
        },
    )
    .await?;
    // One direct reply plus one broadcast per roster member
    for _ in 0..3 {
        let _ = recv(&socket).await;
    }

    send(
        &socket,
        args.server,
        &Packet::SemanticSearch {
            query: "linear algebra vectors".to_string(),
            top_k: 3,
        },
    )
    .await?;

    match recv(&socket).await? {
        Packet::SearchResults { hits } => {
            println!("Search results:");
            for hit in hits {
                println!("  {} ({:.3}) {}", hit.id, hit.score, hit.metadata.name);
            }
        }
        other => return Err(format!("expected SearchResults, got {:?}", other).into()),
    }

    println!("Smoke test complete");
    Ok(())
}
