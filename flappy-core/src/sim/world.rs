use super::*;

#[derive(Clone, Debug)]
struct Agent<D> {
    id: usize,
    bird: Bird,
    brain: D,
    fitness: f64,
    ticks_survived: u32,
    pipes_passed: u32,
    death: Option<DeathEvent>,
}

impl<D> Agent<D> {
    fn new(id: usize, bird: Bird, brain: D) -> Self {
        Self {
            id,
            bird,
            brain,
            fitness: 0.0,
            ticks_survived: 0,
            pipes_passed: 0,
            death: None,
        }
    }

    #[inline]
    fn is_alive(&self) -> bool {
        self.death.is_none()
    }

    fn kill(&mut self, cause: DeathCause, tick: u32) -> DeathEvent {
        let event = DeathEvent {
            agent_id: self.id,
            cause,
            tick,
        };
        self.death = Some(event);
        event
    }

    fn into_result(self) -> AgentResult<D> {
        AgentResult {
            id: self.id,
            brain: self.brain,
            fitness: self.fitness,
            ticks_survived: self.ticks_survived,
            pipes_passed: self.pipes_passed,
            death: self.death,
        }
    }
}

/// One generation: the living agents, the pipes they fly through and the
/// shared score. Dead agents move to a retired list at the end of the tick
/// they die in.
#[derive(Clone, Debug)]
pub struct World<D> {
    config: SimConfig,
    atlas: SpriteAtlas,
    rng: SeededRng,
    seed: u32,
    generation: u32,
    tick: u32,
    score: u32,
    phase: Phase,
    end_reason: Option<EndReason>,
    agents: Vec<Agent<D>>,
    retired: Vec<AgentResult<D>>,
    pipes: Vec<Pipe>,
    ground: Ground,
}

impl<D: DecisionSource> World<D> {
    /// Spawns one bird per brain at the configured spawn point and the first
    /// pipe at `first_pipe_x`.
    pub fn new(
        config: SimConfig,
        seed: u32,
        generation: u32,
        brains: Vec<D>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if brains.is_empty() {
            return Err(ConfigError::NoAgents);
        }

        let mut rng = SeededRng::new(seed);
        let first_pipe = Pipe::spawn(config.first_pipe_x, &config, &mut rng);
        let agents = brains
            .into_iter()
            .enumerate()
            .map(|(id, brain)| Agent::new(id, Bird::spawn(&config), brain))
            .collect();

        Ok(Self {
            atlas: SpriteAtlas::new(&config),
            ground: Ground::new(config.ground_width),
            config,
            rng,
            seed,
            generation,
            tick: 0,
            score: 0,
            phase: Phase::Running,
            end_reason: None,
            agents,
            retired: Vec::new(),
            pipes: vec![first_pipe],
        })
    }

    pub fn tick(&mut self) -> Result<TickOutcome, SimError> {
        if self.phase == Phase::Ended {
            return Err(SimError::GenerationEnded { tick: self.tick });
        }

        self.tick += 1;
        let tick = self.tick;
        let config = &self.config;

        for agent in &mut self.agents {
            let index = active_pipe_index(&self.pipes, agent.bird.x()).ok_or(
                SimError::Invariant {
                    tick,
                    code: InvariantCode::ObstacleListEmpty,
                },
            )?;

            agent.bird.advance(config);
            agent.fitness += config.survival_reward;
            agent.ticks_survived += 1;

            let inputs = decision_inputs(&agent.bird, &self.pipes[index]);
            if wants_jump(&agent.brain.decide(inputs), config.jump_threshold) {
                agent.bird.jump(config);
            }
        }

        // Collision, pass and retirement see the pipe where the tick found it;
        // the scroll comes last.
        let mut deaths = Vec::new();
        let mut pass_pending = false;
        let mut keep = Vec::with_capacity(self.pipes.len());
        for pipe in &mut self.pipes {
            for agent in self.agents.iter_mut().filter(|agent| agent.is_alive()) {
                if pipe.overlaps(&agent.bird, &mut self.atlas) {
                    agent.fitness -= config.collision_penalty;
                    deaths.push(agent.kill(DeathCause::Obstacle, tick));
                } else if !pipe.passed() && pipe.x() < agent.bird.x() {
                    pipe.mark_passed();
                    pass_pending = true;
                }
            }
            keep.push(!pipe.is_off_screen());
            pipe.advance(config);
        }

        let mut keep = keep.into_iter();
        self.pipes.retain(|_| keep.next().unwrap_or(true));
        if pass_pending {
            self.score += 1;
            for agent in self.agents.iter_mut().filter(|agent| agent.is_alive()) {
                agent.fitness += config.pass_reward;
                agent.pipes_passed += 1;
            }
            self.pipes
                .push(Pipe::spawn(config.pipe_spawn_x, config, &mut self.rng));
        }

        for agent in self.agents.iter_mut().filter(|agent| agent.is_alive()) {
            let y = agent.bird.y();
            if y + config.bird_height as f64 >= config.ground_y {
                deaths.push(agent.kill(DeathCause::Ground, tick));
            } else if y < config.ceiling_y {
                deaths.push(agent.kill(DeathCause::Ceiling, tick));
            }
        }

        if !deaths.is_empty() {
            let (dead, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.agents)
                .into_iter()
                .partition(|agent| !agent.is_alive());
            self.agents = alive;
            self.retired.extend(dead.into_iter().map(Agent::into_result));
        }

        self.ground.advance(config);

        let end_reason = if self.agents.is_empty() {
            Some(EndReason::Extinct)
        } else if config.max_score.is_some_and(|cap| self.score >= cap) {
            Some(EndReason::ScoreCap)
        } else if config.max_ticks.is_some_and(|cap| tick >= cap) {
            Some(EndReason::TickLimit)
        } else {
            None
        };
        if end_reason.is_some() {
            self.phase = Phase::Ended;
            self.end_reason = end_reason;
        }

        self.validate_invariants()
            .map_err(|code| SimError::Invariant { tick, code })?;

        Ok(TickOutcome {
            tick,
            deaths,
            pipes_passed: pass_pending as u32,
            score: self.score,
            alive: self.agents.len(),
            phase: self.phase,
        })
    }

    /// Ticks until the generation ends and returns the final tick. Without
    /// `max_ticks` this only terminates once every agent is dead.
    pub fn run_to_end(&mut self) -> Result<u32, SimError> {
        while self.phase == Phase::Running {
            self.tick()?;
        }
        Ok(self.tick)
    }
}

impl<D> World<D> {
    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[inline]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Ticks simulated so far.
    #[inline]
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    #[inline]
    pub fn rng_state(&self) -> u32 {
        self.rng.state()
    }

    /// Number of living agents.
    #[inline]
    pub fn alive(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    #[inline]
    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    /// Living birds with their agent ids.
    pub fn birds(&self) -> impl Iterator<Item = (usize, &Bird)> + '_ {
        self.agents.iter().map(|agent| (agent.id, &agent.bird))
    }

    pub fn brains_mut(&mut self) -> impl Iterator<Item = &mut D> + '_ {
        self.agents.iter_mut().map(|agent| &mut agent.brain)
    }

    /// Results of agents that have died so far, in order of death.
    #[inline]
    pub fn retired(&self) -> &[AgentResult<D>] {
        &self.retired
    }

    /// Current fitness of agent `id`, dead or alive.
    pub fn fitness_of(&self, id: usize) -> Option<f64> {
        self.agents
            .iter()
            .find(|agent| agent.id == id)
            .map(|agent| agent.fitness)
            .or_else(|| {
                self.retired
                    .iter()
                    .find(|result| result.id == id)
                    .map(|result| result.fitness)
            })
    }

    pub fn validate_invariants(&self) -> Result<(), InvariantCode> {
        match self.phase {
            Phase::Running => {
                if self.agents.is_empty() {
                    return Err(InvariantCode::RunningWithoutAgents);
                }
                if self.pipes.is_empty() {
                    return Err(InvariantCode::ObstacleListEmpty);
                }
            }
            Phase::Ended => {
                if self.end_reason == Some(EndReason::Extinct) && !self.agents.is_empty() {
                    return Err(InvariantCode::EndedWithLivingAgents);
                }
            }
        }

        if self.pipes.windows(2).any(|pair| pair[0].x() > pair[1].x()) {
            return Err(InvariantCode::ObstacleOrder);
        }

        for agent in &self.agents {
            let tilt = agent.bird.tilt();
            if !(self.config.min_tilt..=self.config.max_tilt).contains(&tilt) {
                return Err(InvariantCode::BirdTiltRange);
            }
            if agent.bird.last_displacement() > self.config.terminal_displacement {
                return Err(InvariantCode::BirdFallStep);
            }
        }

        Ok(())
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            generation: self.generation,
            tick: self.tick,
            score: self.score,
            phase: self.phase,
            end_reason: self.end_reason,
            rng_state: self.rng.state(),
            birds: self
                .agents
                .iter()
                .map(|agent| BirdSnapshot {
                    id: agent.id,
                    x: agent.bird.x(),
                    y: agent.bird.y(),
                    velocity: agent.bird.velocity(),
                    tilt: agent.bird.tilt(),
                    frame: agent.bird.frame(),
                    fitness: agent.fitness,
                })
                .collect(),
            pipes: self
                .pipes
                .iter()
                .map(|pipe| PipeSnapshot {
                    x: pipe.x(),
                    gap_top: pipe.gap_top(),
                    gap_bottom: pipe.gap_bottom(),
                    passed: pipe.passed(),
                })
                .collect(),
            ground: GroundSnapshot {
                x1: self.ground.x1(),
                x2: self.ground.x2(),
            },
        }
    }

    /// Consumes the world. Agents still alive (the generation ended on a
    /// cap) are reported without a death.
    pub fn into_report(self) -> GenerationReport<D> {
        let mut results = self.retired;
        results.extend(self.agents.into_iter().map(Agent::into_result));
        results.sort_by_key(|result| result.id);

        GenerationReport {
            generation: self.generation,
            seed: self.seed,
            ticks: self.tick,
            score: self.score,
            end_reason: self.end_reason,
            results,
        }
    }
}
