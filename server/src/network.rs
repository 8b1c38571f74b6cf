//! Server network layer handling UDP communications and packet dispatch

use crate::coordinator::SessionCoordinator;
use crate::embedding::TextEmbedder;
use crate::graph::{ConceptFields, GraphStore, InMemoryGraphStore};
use crate::question::QuestionBank;
use crate::session::SessionError;
use crate::similarity::{SimilarityEngine, SimilarityError, VectorIndex};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ConceptMetadata, Packet, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// How often the dispatch loop checks question deadlines.
const DEADLINE_TICK: Duration = Duration::from_millis(500);

/// Messages sent from network tasks to the dispatch loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SessionsEvicted {
        session_ids: Vec<String>,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the dispatch loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    Send {
        packet: Packet,
        addr: SocketAddr,
    },
    Broadcast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating the transport and the quiz/search cores
pub struct Server {
    socket: Arc<UdpSocket>,
    coordinator: Arc<RwLock<SessionCoordinator>>,
    engine: Arc<RwLock<SimilarityEngine>>,
    graph: Arc<RwLock<InMemoryGraphStore>>,
    /// Player id -> last known return address, filled on join.
    player_addrs: HashMap<String, SocketAddr>,
    max_idle: Duration,
    sweep_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        embedding_dimension: usize,
        max_idle: Duration,
        sweep_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let coordinator =
            SessionCoordinator::new(Box::new(QuestionBank::with_default_questions()));
        let engine = SimilarityEngine::new(TextEmbedder::new(embedding_dimension));

        Ok(Server {
            socket,
            coordinator: Arc::new(RwLock::new(coordinator)),
            engine: Arc::new(RwLock::new(engine)),
            graph: Arc::new(RwLock::new(InMemoryGraphStore::new())),
            player_addrs: HashMap::new(),
            max_idle,
            sweep_interval,
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    /// Address the server socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle to the similarity engine, for seeding the catalog.
    pub fn engine(&self) -> Arc<RwLock<SimilarityEngine>> {
        Arc::clone(&self.engine)
    }

    /// Shared handle to the graph store, for seeding the catalog.
    pub fn graph(&self) -> Arc<RwLock<InMemoryGraphStore>> {
        Arc::clone(&self.graph)
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to dispatch loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    OutboundMessage::Send { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::Broadcast { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that periodically evicts idle sessions
    fn spawn_idle_sweeper(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        let server_tx = self.server_tx.clone();
        let max_idle = self.max_idle;
        let sweep_interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut sweep = interval(sweep_interval);

            loop {
                sweep.tick().await;

                let evicted = {
                    let mut coordinator = coordinator.write().await;
                    coordinator.sweep_idle(max_idle)
                };

                if !evicted.is_empty() {
                    if let Err(e) =
                        server_tx.send(ServerMessage::SessionsEvicted { session_ids: evicted })
                    {
                        error!("Failed to send eviction message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::Send { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues a packet for every roster member with a known address.
    fn broadcast_to_roster(&self, roster: &[String], packet: Packet) {
        let addrs: Vec<SocketAddr> = roster
            .iter()
            .filter_map(|player| self.player_addrs.get(player).copied())
            .collect();

        if addrs.is_empty() {
            return;
        }
        if let Err(e) = self.out_tx.send(OutboundMessage::Broadcast { packet, addrs }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn send_session_error(&self, error: SessionError, addr: SocketAddr) {
        self.send_packet(
            Packet::Error {
                kind: error.kind(),
                message: error.to_string(),
            },
            addr,
        );
    }

    fn send_similarity_error(&self, error: SimilarityError, addr: SocketAddr) {
        self.send_packet(
            Packet::Error {
                kind: error.kind(),
                message: error.to_string(),
            },
            addr,
        );
    }

    /// Processes one client packet against the cores and queues replies
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::CreateSession {
                client_version,
                config,
            } => {
                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Client at {} speaks protocol {} (server: {})",
                        addr, client_version, PROTOCOL_VERSION
                    );
                }

                let created = {
                    let mut coordinator = self.coordinator.write().await;
                    coordinator.create_session(config)
                };

                match created {
                    Ok(session_id) => self.send_packet(Packet::SessionCreated { session_id }, addr),
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::JoinSession {
                session_id,
                player_id,
            } => {
                let joined = {
                    let mut coordinator = self.coordinator.write().await;
                    match coordinator.join_session(&session_id, &player_id) {
                        Ok(roster) => {
                            let status = coordinator
                                .session_status(&session_id)
                                .unwrap_or(shared::SessionStatus::Waiting);
                            Ok((roster, status))
                        }
                        Err(e) => Err(e),
                    }
                };

                match joined {
                    Ok((roster, status)) => {
                        self.player_addrs.insert(player_id, addr);
                        self.broadcast_to_roster(
                            &roster,
                            Packet::SessionJoined {
                                session_id,
                                status,
                                roster: roster.clone(),
                            },
                        );
                    }
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::LeaveSession {
                session_id,
                player_id,
            } => {
                let left = {
                    let mut coordinator = self.coordinator.write().await;
                    coordinator.leave_session(&session_id, &player_id)
                };

                match left {
                    Ok(roster) => {
                        self.player_addrs.remove(&player_id);
                        self.send_packet(
                            Packet::SessionLeft {
                                session_id: session_id.clone(),
                                roster: roster.clone(),
                            },
                            addr,
                        );
                        self.broadcast_to_roster(
                            &roster,
                            Packet::SessionLeft { session_id, roster: roster.clone() },
                        );
                    }
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::StartSession { session_id } => {
                let started = {
                    let mut coordinator = self.coordinator.write().await;
                    match coordinator.start_session(&session_id) {
                        Ok(question) => {
                            let roster = coordinator
                                .session(&session_id)
                                .map(|s| s.roster())
                                .unwrap_or_default();
                            Ok((question, roster))
                        }
                        Err(e) => Err(e),
                    }
                };

                match started {
                    Ok((Some(question), roster)) => {
                        self.broadcast_to_roster(
                            &roster,
                            Packet::SessionStarted {
                                session_id,
                                question,
                            },
                        );
                    }
                    Ok((None, roster)) => {
                        // Question source was empty; session is already over
                        self.broadcast_to_roster(
                            &roster,
                            Packet::QuestionAdvanced {
                                session_id,
                                question: None,
                            },
                        );
                    }
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::SubmitAnswer {
                session_id,
                player_id,
                answer_index,
            } => {
                let outcome = {
                    let mut coordinator = self.coordinator.write().await;
                    coordinator.submit_answer(&session_id, &player_id, answer_index)
                };

                match outcome {
                    Ok(outcome) => self.send_packet(
                        Packet::AnswerResult {
                            correct: outcome.correct,
                            score: outcome.score,
                        },
                        addr,
                    ),
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::AdvanceQuestion { session_id } => {
                let advanced = {
                    let mut coordinator = self.coordinator.write().await;
                    match coordinator.advance_question(&session_id) {
                        Ok(question) => {
                            let roster = coordinator
                                .session(&session_id)
                                .map(|s| s.roster())
                                .unwrap_or_default();
                            Ok((question, roster))
                        }
                        Err(e) => Err(e),
                    }
                };

                match advanced {
                    Ok((question, roster)) => {
                        self.broadcast_to_roster(
                            &roster,
                            Packet::QuestionAdvanced {
                                session_id,
                                question,
                            },
                        );
                    }
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::CloseSession { session_id } => {
                let closed = {
                    let mut coordinator = self.coordinator.write().await;
                    match coordinator.close_session(&session_id) {
                        Ok(()) => {
                            let roster = coordinator
                                .session(&session_id)
                                .map(|s| s.roster())
                                .unwrap_or_default();
                            Ok(roster)
                        }
                        Err(e) => Err(e),
                    }
                };

                match closed {
                    Ok(roster) => {
                        self.send_packet(
                            Packet::SessionClosed {
                                session_id: session_id.clone(),
                            },
                            addr,
                        );
                        self.broadcast_to_roster(
                            &roster,
                            Packet::SessionClosed { session_id },
                        );
                    }
                    Err(e) => self.send_session_error(e, addr),
                }
            }

            Packet::IndexConcept { id, metadata } => {
                let indexed = self.index_concept(&id, metadata).await;
                match indexed {
                    Ok(()) => self.send_packet(Packet::ConceptIndexed { id }, addr),
                    Err(e) => self.send_similarity_error(e, addr),
                }
            }

            Packet::SemanticSearch { query, top_k } => {
                let hits = {
                    let engine = self.engine.read().await;
                    engine.semantic_search(&query, top_k)
                };

                match hits {
                    Ok(hits) => self.send_packet(Packet::SearchResults { hits }, addr),
                    Err(e) => self.send_similarity_error(e, addr),
                }
            }

            Packet::Recommend { concept_id, top_k } => {
                let hits = {
                    let engine = self.engine.read().await;
                    engine.get_recommendations(&concept_id, top_k)
                };

                match hits {
                    Ok(hits) => self.send_packet(Packet::SearchResults { hits }, addr),
                    Err(e) => self.send_similarity_error(e, addr),
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Upserts a concept into the graph store and (re)indexes its
    /// embedding, derived from name, description, and tags.
    async fn index_concept(
        &self,
        id: &str,
        metadata: ConceptMetadata,
    ) -> Result<(), SimilarityError> {
        {
            let mut graph = self.graph.write().await;
            // The backend translation layer would surface store failures
            // as BackendUnavailable here; the in-memory store cannot fail.
            let _ = graph.upsert_concept(ConceptFields {
                name: metadata.name.clone(),
                category: metadata.category.clone(),
                difficulty: metadata.difficulty.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
            });
        }

        let mut engine = self.engine.write().await;
        let text = format!(
            "{} {} {}",
            metadata.name,
            metadata.description,
            metadata.tags.join(" ")
        );
        let vector = engine.embedder().embed(&text);
        engine.upsert(id, vector, metadata)
    }

    /// Advances every Active session whose question deadline has passed
    async fn tick_question_deadlines(&mut self) {
        let now = Instant::now();

        let advanced: Vec<(String, Option<shared::Question>, Vec<String>)> = {
            let mut coordinator = self.coordinator.write().await;
            let expired = coordinator.sessions_with_expired_questions(now);

            expired
                .into_iter()
                .filter_map(|session_id| {
                    let question = coordinator.advance_question(&session_id).ok()?;
                    let roster = coordinator
                        .session(&session_id)
                        .map(|s| s.roster())
                        .unwrap_or_default();
                    Some((session_id, question, roster))
                })
                .collect()
        };

        for (session_id, question, roster) in advanced {
            debug!(
                "Question deadline passed in session {}; advancing",
                session_id
            );
            self.broadcast_to_roster(
                &roster,
                Packet::QuestionAdvanced {
                    session_id,
                    question,
                },
            );
        }
    }

    /// Main dispatch loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_idle_sweeper();

        let mut deadline_interval = interval(DEADLINE_TICK);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::SessionsEvicted { session_ids }) => {
                            for session_id in session_ids {
                                debug!("Session {} evicted for idleness", session_id);
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = deadline_interval.tick() => {
                    self.tick_question_deadlines().await;
                }
            }
        }

        Ok(())
    }
}
